//! Simulation trace and result types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Completed,
    Failed,
    Cancelled,
}

/// One executed node visit. Loops produce one step per iteration, so the
/// step list is the unrolled execution, not the static graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationStep {
    /// Position in the trace; `depends_on` refers to these.
    pub index: usize,
    pub node_id: String,
    pub node_name: String,
    /// Declared inputs that were present as artifacts when the node ran.
    pub resolved_inputs: Vec<String>,
    pub produced_outputs: Vec<String>,
    pub estimated_tokens: u64,
    pub estimated_time_ms: u64,
    pub estimated_cost: f64,
    /// Node ids this step routed to.
    pub chosen_next: Vec<String>,
    /// Indices of the steps this one had to wait for.
    pub depends_on: Vec<usize>,
}

/// A node flagged as dominating the simulated schedule, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottleneck {
    pub node_id: String,
    pub reason: String,
}

/// What `step()` observed.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// A node was executed; the payload indexes into the step trace.
    Step(usize),
    /// Paused before executing this node; the next `step()` executes it.
    BreakpointHit(String),
    /// Nothing left to do. Repeated calls keep returning this.
    Finished,
}

/// Aggregate outcome of a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub status: SimulationStatus,
    pub steps: Vec<SimulationStep>,
    /// Node ids along the longest cumulative-time path of the realized trace.
    pub critical_path: Vec<String>,
    /// Groups of mutually independent parallel-eligible steps (node ids).
    pub parallel_blocks: Vec<Vec<String>>,
    pub peak_parallelism: usize,
    pub bottlenecks: Vec<Bottleneck>,
    /// Distinct visited nodes over reachable nodes, in percent.
    pub coverage_percentage: f64,
    pub total_estimated_cost: f64,
    /// Critical-path time, not the sum over steps.
    pub total_estimated_time_ms: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}
