//! Core model types: agent nodes, edges with their declarative policies,
//! loop constructs, and the aggregate [`WorkflowGraph`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::condition::RoutingCondition;

/// Closed set of agent archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    Orchestrator,
    Architect,
    Critic,
    RedTeam,
    Researcher,
    Coder,
    Tester,
    Writer,
    Worker,
    Finalizer,
    LoopController,
}

impl AgentRole {
    /// Roles that legitimately end a workflow without outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentRole::Finalizer)
    }
}

/// How much reasoning budget the agent is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingDepth {
    Minimal,
    Balanced,
    Extended,
}

impl Default for ThinkingDepth {
    fn default() -> Self {
        ThinkingDepth::Balanced
    }
}

/// Per-node execution configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub thinking_depth: ThinkingDepth,
    #[serde(default)]
    pub parallel_eligible: bool,
    #[serde(default = "default_node_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry_count: u32,
}

fn default_node_timeout_ms() -> u64 {
    60_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            thinking_depth: ThinkingDepth::default(),
            parallel_eligible: false,
            timeout_ms: default_node_timeout_ms(),
            retry_count: 0,
        }
    }
}

/// What the executor should do when the node's success criteria are not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    Retry,
    Skip,
    Abort,
}

impl Default for FailureAction {
    fn default() -> Self {
        FailureAction::Abort
    }
}

/// A unit of work in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub role: AgentRole,
    #[serde(default)]
    pub config: AgentConfig,
    /// Named artifact identifiers consumed by this node. Insertion order
    /// carries no meaning.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Artifact identifiers produced by this node.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Opaque prompt text, never interpreted by the engine.
    #[serde(default)]
    pub prompt_template: String,
    /// Opaque success criteria text.
    #[serde(default)]
    pub success_criteria: String,
    #[serde(default)]
    pub on_failure: FailureAction,
}

/// Backoff shape for the edge retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    None,
    Fixed,
    Linear,
    Exponential,
}

/// Retry/backoff policy carried by an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff")]
    pub backoff: BackoffStrategy,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> BackoffStrategy {
    BackoffStrategy::Exponential
}

fn default_base_delay_ms() -> u64 {
    1_000
}

/// Circuit-breaker policy carried by an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerPolicy {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

/// Resilience policy: retry, circuit breaker, fallback, and the three-tier
/// timeout. Invariant (enforced by the validator, not here):
/// `response_timeout_ms <= execution_timeout_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResiliencePolicy {
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerPolicy>,
    /// Edge id to traverse instead when this edge's target fails.
    #[serde(default)]
    pub fallback_edge: Option<String>,
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    #[serde(default = "default_total_timeout_ms")]
    pub total_timeout_ms: u64,
}

fn default_execution_timeout_ms() -> u64 {
    30_000
}

fn default_response_timeout_ms() -> u64 {
    30_000
}

fn default_total_timeout_ms() -> u64 {
    120_000
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            retry: None,
            circuit_breaker: None,
            fallback_edge: None,
            execution_timeout_ms: default_execution_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            total_timeout_ms: default_total_timeout_ms(),
        }
    }
}

/// Message-passing style between the two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationMode {
    Sync,
    Async,
    Streaming,
}

/// Payload encoding on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    Json,
    MessagePack,
    Raw,
}

/// Communication policy carried by an edge. Consumed by an external
/// executor; the engine only validates and simulates against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationPolicy {
    pub mode: CommunicationMode,
    #[serde(default = "default_serialization")]
    pub serialization: SerializationFormat,
    #[serde(default)]
    pub schema_validation: bool,
}

fn default_serialization() -> SerializationFormat {
    SerializationFormat::Json
}

/// Resource limits carried by an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default)]
    pub max_concurrent: Option<u32>,
    #[serde(default)]
    pub max_memory_mb: Option<u64>,
    #[serde(default)]
    pub token_budget: Option<u64>,
}

/// Role an edge plays with respect to a declared loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopRole {
    Entry,
    Iterate,
    Return,
    Exit,
    None,
}

impl Default for LoopRole {
    fn default() -> Self {
        LoopRole::None
    }
}

/// Directed relation between two agent nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub condition: RoutingCondition,
    /// Tie-break among multiple eligible outgoing edges; lower wins.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub loop_role: LoopRole,
    #[serde(default)]
    pub resilience: Option<ResiliencePolicy>,
    #[serde(default)]
    pub communication: Option<CommunicationPolicy>,
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

impl Edge {
    /// Minimal unconditional edge, the shape the editor creates by default.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            condition: RoutingCondition::Always,
            priority: 0,
            loop_role: LoopRole::None,
            resilience: None,
            communication: None,
            limits: None,
        }
    }
}

/// A declared loop: entry/exit nodes, the closed body set, a repeat-until
/// exit condition, and a hard iteration cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    pub id: String,
    pub entry_node: String,
    pub exit_node: String,
    /// Node ids inside the loop body, entry and exit included.
    pub body: Vec<String>,
    /// The loop repeats **until** this condition is true.
    pub exit_condition: RoutingCondition,
    pub max_iterations: u32,
    /// State key holding the current iteration counter.
    pub counter_key: String,
    /// State key scoping loop-local values.
    #[serde(default)]
    pub scope_key: Option<String>,
}

impl LoopConfig {
    pub fn contains(&self, node_id: &str) -> bool {
        self.entry_node == node_id
            || self.exit_node == node_id
            || self.body.iter().any(|n| n == node_id)
    }
}

/// Overall execution style of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    Sequential,
    Orchestrator,
    Parallel,
    StateMachine,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

/// The aggregate graph the editor hands to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<AgentNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub loops: Vec<LoopConfig>,
}

impl WorkflowGraph {
    pub fn node(&self, id: &str) -> Option<&AgentNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Outgoing edges of `id` in declaration order. Declaration order is the
    /// tie-break when priorities collide.
    pub fn edges_from(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == id).collect()
    }

    pub fn edges_into(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.target == id).collect()
    }

    /// The loop an edge belongs to: both endpoints inside the loop's member
    /// set, or crossing its entry/exit boundary.
    pub fn loop_for_edge(&self, edge: &Edge) -> Option<&LoopConfig> {
        self.loops
            .iter()
            .find(|l| l.contains(&edge.source) || l.contains(&edge.target))
    }

    /// Entry points: nodes with no incoming edge other than loop `return`
    /// edges (a loop entry is still an entry point of the graph when only
    /// the back-edge targets it).
    pub fn entry_nodes(&self) -> Vec<&AgentNode> {
        self.nodes
            .iter()
            .filter(|n| {
                !self
                    .edges
                    .iter()
                    .any(|e| e.target == n.id && e.loop_role != LoopRole::Return)
            })
            .collect()
    }

    /// Remove a node and cascade-delete its incident edges.
    pub fn remove_node(&mut self, id: &str) {
        self.nodes.retain(|n| n.id != id);
        self.edges.retain(|e| e.source != id && e.target != id);
        for l in &mut self.loops {
            l.body.retain(|n| n != id);
        }
    }

    /// Every artifact path some node declares as an output.
    pub fn produced_artifacts(&self) -> HashSet<&str> {
        self.nodes
            .iter()
            .flat_map(|n| n.outputs.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, role: AgentRole) -> AgentNode {
        AgentNode {
            id: id.to_string(),
            name: id.to_string(),
            role,
            config: AgentConfig::default(),
            inputs: vec![],
            outputs: vec![],
            prompt_template: String::new(),
            success_criteria: String::new(),
            on_failure: FailureAction::default(),
        }
    }

    #[test]
    fn test_edges_from_preserves_declaration_order() {
        let g = WorkflowGraph {
            name: "g".into(),
            nodes: vec![node("a", AgentRole::Worker), node("b", AgentRole::Worker)],
            edges: vec![
                Edge::new("e2", "a", "b"),
                Edge::new("e1", "a", "b"),
            ],
            mode: ExecutionMode::default(),
            loops: vec![],
        };
        let out: Vec<&str> = g.edges_from("a").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(out, vec!["e2", "e1"]);
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let mut g = WorkflowGraph {
            name: "g".into(),
            nodes: vec![
                node("a", AgentRole::Worker),
                node("b", AgentRole::Worker),
                node("c", AgentRole::Finalizer),
            ],
            edges: vec![Edge::new("e1", "a", "b"), Edge::new("e2", "b", "c")],
            mode: ExecutionMode::default(),
            loops: vec![],
        };
        g.remove_node("b");
        assert!(g.node("b").is_none());
        assert!(g.edges.is_empty());
    }

    #[test]
    fn test_entry_nodes_ignores_return_edges() {
        let mut back = Edge::new("ret", "body", "head");
        back.loop_role = LoopRole::Return;
        let g = WorkflowGraph {
            name: "g".into(),
            nodes: vec![node("head", AgentRole::LoopController), node("body", AgentRole::Worker)],
            edges: vec![Edge::new("fwd", "head", "body"), back],
            mode: ExecutionMode::default(),
            loops: vec![],
        };
        let entries: Vec<&str> = g.entry_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(entries, vec!["head"]);
    }

    #[test]
    fn test_terminal_role() {
        assert!(AgentRole::Finalizer.is_terminal());
        assert!(!AgentRole::Worker.is_terminal());
    }

    #[test]
    fn test_graph_serde_roundtrip() {
        let g = WorkflowGraph {
            name: "wf".into(),
            nodes: vec![node("a", AgentRole::Orchestrator)],
            edges: vec![],
            mode: ExecutionMode::Orchestrator,
            loops: vec![],
        };
        let s = serde_json::to_string(&g).unwrap();
        let back: WorkflowGraph = serde_json::from_str(&s).unwrap();
        assert_eq!(back, g);
    }
}
