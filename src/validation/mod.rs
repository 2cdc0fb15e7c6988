//! Graph validation.
//!
//! `validate` is a pure function over the graph: it never mutates its input
//! and never panics on malformed graphs — every problem surfaces as a coded
//! [`Diagnostic`]. The simulator treats error-level findings as fatal and
//! warning-level findings as advisory.
//!
//! Checks are split into three passes, mirrored by the submodules:
//! structure (endpoints, entries, reachability), loop consistency, and
//! condition/policy semantics.

mod conditions;
mod loops;
mod structural;
mod types;

pub use types::{Diagnostic, DiagnosticLevel, ValidationReport};

use crate::graph::{GraphIndex, WorkflowGraph};

/// Validate a workflow graph, producing a full report.
pub fn validate(graph: &WorkflowGraph) -> ValidationReport {
    let mut diagnostics = Vec::new();

    let index = GraphIndex::build(graph);
    structural::check(graph, &index, &mut diagnostics);
    loops::check(graph, &mut diagnostics);
    conditions::check(graph, &index, &mut diagnostics);

    let is_valid = !diagnostics
        .iter()
        .any(|d| d.level == DiagnosticLevel::Error);
    ValidationReport {
        is_valid,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        AgentConfig, AgentNode, AgentRole, CompareOperator, Edge, FailureAction, LoopConfig,
        LoopRole, ResiliencePolicy, RoutingCondition, WorkflowGraph,
    };
    use serde_json::json;

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
            on_failure: FailureAction::Abort,
        }
    }

    fn graph(nodes: Vec<AgentNode>, edges: Vec<Edge>) -> WorkflowGraph {
        WorkflowGraph {
            name: "t".into(),
            nodes,
            edges,
            mode: Default::default(),
            loops: vec![],
        }
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let report = validate(&graph(vec![], vec![]));
        assert!(report.is_valid);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_dangling_endpoint_is_error() {
        let g = graph(
            vec![node("a", AgentRole::Worker)],
            vec![Edge::new("e1", "a", "ghost")],
        );
        let report = validate(&g);
        assert!(!report.is_valid);
        assert!(report.errors().iter().any(|d| d.code == "E101"));
    }

    #[test]
    fn test_no_entry_point_is_error() {
        let g = graph(
            vec![node("a", AgentRole::Worker), node("b", AgentRole::Worker)],
            vec![Edge::new("e1", "a", "b"), Edge::new("e2", "b", "a")],
        );
        let report = validate(&g);
        assert!(report.errors().iter().any(|d| d.code == "E102"));
    }

    #[test]
    fn test_isolated_node_is_an_entry_not_unreachable() {
        let g = graph(
            vec![
                node("a", AgentRole::Worker),
                node("b", AgentRole::Finalizer),
                node("island", AgentRole::Worker),
            ],
            vec![Edge::new("e1", "a", "b")],
        );
        let report = validate(&g);
        assert!(report.is_valid);
        // no incoming edge makes it an entry point, so it is trivially
        // reachable; what it gets flagged for is the non-terminal dead end
        assert!(!report.warnings().iter().any(|d| d.code == "W101"));
        assert!(report
            .warnings()
            .iter()
            .any(|d| d.code == "W102" && d.node_id.as_deref() == Some("island")));
    }

    #[test]
    fn test_unreachable_cycle_is_warning() {
        // c and d feed each other, so neither is an entry and nothing on
        // the live path reaches them
        let g = graph(
            vec![
                node("a", AgentRole::Worker),
                node("b", AgentRole::Finalizer),
                node("c", AgentRole::Worker),
                node("d", AgentRole::Worker),
            ],
            vec![
                Edge::new("e1", "a", "b"),
                Edge::new("e2", "c", "d"),
                Edge::new("e3", "d", "c"),
            ],
        );
        let report = validate(&g);
        assert!(report.is_valid);
        for id in ["c", "d"] {
            assert!(report
                .warnings()
                .iter()
                .any(|d| d.code == "W101" && d.node_id.as_deref() == Some(id)));
        }
    }

    #[test]
    fn test_non_terminal_sink_is_warning() {
        let g = graph(
            vec![node("a", AgentRole::Worker), node("b", AgentRole::Worker)],
            vec![Edge::new("e1", "a", "b")],
        );
        let report = validate(&g);
        assert!(report
            .warnings()
            .iter()
            .any(|d| d.code == "W102" && d.node_id.as_deref() == Some("b")));
    }

    #[test]
    fn test_finalizer_sink_is_fine() {
        let g = graph(
            vec![node("a", AgentRole::Worker), node("b", AgentRole::Finalizer)],
            vec![Edge::new("e1", "a", "b")],
        );
        let report = validate(&g);
        assert!(!report.warnings().iter().any(|d| d.code == "W102"));
    }

    #[test]
    fn test_loop_role_edge_without_loop_config() {
        let mut e = Edge::new("e1", "a", "b");
        e.loop_role = LoopRole::Return;
        let g = graph(
            vec![node("a", AgentRole::Worker), node("b", AgentRole::Worker)],
            vec![e],
        );
        let report = validate(&g);
        assert!(report.errors().iter().any(|d| d.code == "E201"));
    }

    #[test]
    fn test_loop_member_outside_graph() {
        let mut g = graph(
            vec![node("a", AgentRole::Worker), node("b", AgentRole::Worker)],
            vec![Edge::new("e1", "a", "b")],
        );
        g.loops.push(LoopConfig {
            id: "l1".into(),
            entry_node: "a".into(),
            exit_node: "ghost".into(),
            body: vec!["a".into(), "b".into()],
            exit_condition: RoutingCondition::Always,
            max_iterations: 3,
            counter_key: "i".into(),
            scope_key: None,
        });
        let report = validate(&g);
        assert!(report.errors().iter().any(|d| d.code == "E202"));
    }

    #[test]
    fn test_return_edge_leaving_body() {
        let mut back = Edge::new("ret", "b", "outside");
        back.loop_role = LoopRole::Return;
        let mut g = graph(
            vec![
                node("a", AgentRole::LoopController),
                node("b", AgentRole::Worker),
                node("outside", AgentRole::Finalizer),
            ],
            vec![Edge::new("e1", "a", "b"), back],
        );
        g.loops.push(LoopConfig {
            id: "l1".into(),
            entry_node: "a".into(),
            exit_node: "b".into(),
            body: vec!["a".into(), "b".into()],
            exit_condition: RoutingCondition::Always,
            max_iterations: 3,
            counter_key: "i".into(),
            scope_key: None,
        });
        let report = validate(&g);
        assert!(report.errors().iter().any(|d| d.code == "E203"));
    }

    #[test]
    fn test_timeout_ordering_is_error() {
        let mut e = Edge::new("e1", "a", "b");
        e.resilience = Some(ResiliencePolicy {
            execution_timeout_ms: 1_000,
            response_timeout_ms: 5_000,
            ..Default::default()
        });
        let g = graph(
            vec![node("a", AgentRole::Worker), node("b", AgentRole::Finalizer)],
            vec![e],
        );
        let report = validate(&g);
        assert!(report
            .errors()
            .iter()
            .any(|d| d.code == "E301" && d.edge_id.as_deref() == Some("e1")));
    }

    #[test]
    fn test_dead_state_condition_is_warning_not_error() {
        let mut e = Edge::new("e1", "a", "b");
        e.condition = RoutingCondition::StateCheck {
            key: "never_written".into(),
            operator: CompareOperator::Equals,
            value: json!(1),
        };
        let g = graph(
            vec![node("a", AgentRole::Worker), node("b", AgentRole::Finalizer)],
            vec![e],
        );
        let report = validate(&g);
        assert!(report.is_valid);
        assert!(report.warnings().iter().any(|d| d.code == "W201"));
    }

    #[test]
    fn test_duplicate_priority_siblings() {
        let mut e1 = Edge::new("e1", "a", "b");
        let mut e2 = Edge::new("e2", "a", "c");
        e1.priority = 5;
        e2.priority = 5;
        let g = graph(
            vec![
                node("a", AgentRole::Worker),
                node("b", AgentRole::Finalizer),
                node("c", AgentRole::Finalizer),
            ],
            vec![e1, e2],
        );
        let report = validate(&g);
        assert!(report.warnings().iter().any(|d| d.code == "W203"));
    }
}
