//! # AgentFlow — a multi-agent workflow engine
//!
//! `agentflow` is an in-process engine for visual multi-agent workflow
//! graphs: typed agent nodes connected by conditional edges, with declared
//! loops, validated structurally and semantically, dry-run simulated with
//! deterministic cost estimates, and backed by an append-only artifact
//! version store with conflict detection and resolution.
//!
//! - **Graph model**: agent roles, routing conditions, loop constructs,
//!   edge-level resilience/communication/resource policies.
//! - **Validation**: coded diagnostics over structure, reachability, loops,
//!   conditions, and timeout policies; findings never panic.
//! - **Simulation**: cooperative step-by-step or fast-forward dry runs with
//!   breakpoints, loop unrolling under iteration caps, critical-path and
//!   parallelism analysis, and coverage reporting.
//! - **Artifacts**: content-addressed immutable versions with lineage,
//!   schema checks, and a validation gate for critical artifacts.
//! - **Conflicts**: three-way diff detection between concurrent versions
//!   and a pluggable set of resolution strategies.
//!
//! The engine performs no I/O and invokes no agents; it validates,
//! simulates, and records. Execution belongs to an external runner.
//!
//! # Quick Start
//!
//! ```rust
//! use agentflow::graph::{AgentNode, AgentRole, Edge, WorkflowGraph};
//! use agentflow::simulator::{start_simulation, SimulationConfig};
//! use agentflow::validation::validate;
//!
//! let graph: WorkflowGraph = serde_json::from_str(r#"{
//!     "name": "review",
//!     "nodes": [
//!         {"id": "draft", "role": "writer"},
//!         {"id": "review", "role": "critic"},
//!         {"id": "publish", "role": "finalizer"}
//!     ],
//!     "edges": [
//!         {"id": "e1", "source": "draft", "target": "review"},
//!         {"id": "e2", "source": "review", "target": "publish"}
//!     ]
//! }"#).unwrap();
//!
//! let report = validate(&graph);
//! assert!(report.is_valid);
//!
//! let result = start_simulation(graph, SimulationConfig::default());
//! assert_eq!(result.steps.len(), 3);
//! ```

pub mod conflict;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod simulator;
pub mod store;
pub mod validation;

pub use conflict::{ArtifactConflict, ConflictRegistry, ConflictSeverity, ResolutionPolicy};
pub use error::{ConflictError, EngineError, EngineResult};
pub use evaluator::{evaluate, SimState};
pub use graph::WorkflowGraph;
pub use simulator::{start_simulation, Simulation, SimulationConfig, SimulationResult};
pub use store::{ArtifactStore, VersionedArtifact};
pub use validation::{validate, ValidationReport};
