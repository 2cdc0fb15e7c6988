//! Dry-run execution over a workflow graph.
//!
//! Nothing is invoked for real: node visits are estimated (tokens, time,
//! cost), routing conditions run against mock state, and the resulting
//! trace is analyzed for critical path, parallelism, bottlenecks, and
//! coverage.

mod analysis;
mod config;
mod engine;
mod trace;

pub use config::{SimulationConfig, SimulationMode};
pub use engine::{start_simulation, Simulation};
pub use trace::{
    Bottleneck, SimulationResult, SimulationStatus, SimulationStep, StepEvent,
};
