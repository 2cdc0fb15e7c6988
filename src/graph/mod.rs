//! Workflow graph model: typed nodes, edges, loop constructs, and routing
//! conditions, plus the petgraph-backed index used by the validator and the
//! simulator.

pub mod condition;
pub mod index;
pub mod team;
pub mod types;

pub use condition::{CompareOperator, RoutingCondition};
pub use index::{GraphIndex, NodeIndexMap};
pub use team::{expand_team, TeamExpansion, TeamMember};
pub use types::{
    AgentConfig, AgentNode, AgentRole, BackoffStrategy, CircuitBreakerPolicy, CommunicationMode,
    CommunicationPolicy, Edge, ExecutionMode, FailureAction, LoopConfig, LoopRole,
    ResiliencePolicy, ResourceLimits, RetryPolicy, SerializationFormat, ThinkingDepth,
    WorkflowGraph,
};
