//! Structural checks: edge endpoints, entry points, reachability, terminal
//! roles, and sibling priority collisions.

use std::collections::HashMap;

use crate::graph::{ExecutionMode, GraphIndex, WorkflowGraph};

use super::types::Diagnostic;

pub fn check(graph: &WorkflowGraph, index: &GraphIndex, diags: &mut Vec<Diagnostic>) {
    for edge in &graph.edges {
        if graph.node(&edge.source).is_none() {
            diags.push(
                Diagnostic::error(
                    "E101",
                    format!("Edge references missing source node: {}", edge.source),
                )
                .at_edge(&edge.id),
            );
        }
        if graph.node(&edge.target).is_none() {
            diags.push(
                Diagnostic::error(
                    "E101",
                    format!("Edge references missing target node: {}", edge.target),
                )
                .at_edge(&edge.id),
            );
        }
    }

    let entries: Vec<String> = graph.entry_nodes().iter().map(|n| n.id.clone()).collect();
    if entries.is_empty() && !graph.nodes.is_empty() {
        diags.push(Diagnostic::error(
            "E102",
            "Graph has no entry point (every node has an unresolved incoming edge)",
        ));
        return;
    }

    let reachable = index.reachable_from(&entries);
    for node in &graph.nodes {
        if !reachable.contains(&node.id) {
            diags.push(
                Diagnostic::warning(
                    "W101",
                    format!("Node is unreachable from any entry point: {}", node.id),
                )
                .at_node(&node.id),
            );
        }
    }

    for node in &graph.nodes {
        if graph.edges_from(&node.id).is_empty() && !node.role.is_terminal() {
            diags.push(
                Diagnostic::warning(
                    "W102",
                    format!(
                        "Node '{}' has no outgoing edge but role {:?} is not terminal",
                        node.id, node.role
                    ),
                )
                .at_node(&node.id),
            );
        }
    }

    for node in &graph.nodes {
        let siblings = graph.edges_from(&node.id);
        let mut seen: HashMap<i32, &str> = HashMap::new();
        for edge in &siblings {
            if let Some(first) = seen.insert(edge.priority, &edge.id) {
                diags.push(
                    Diagnostic::warning(
                        "W203",
                        format!(
                            "Edges '{}' and '{}' from node '{}' share priority {}; \
                             tie-break falls back to declaration order",
                            first, edge.id, node.id, edge.priority
                        ),
                    )
                    .at_node(&node.id),
                );
            }
        }
    }

    suggestions(graph, diags);
}

fn suggestions(graph: &WorkflowGraph, diags: &mut Vec<Diagnostic>) {
    if graph.mode == ExecutionMode::Orchestrator {
        let entries = graph.entry_nodes();
        if let [single] = entries.as_slice() {
            if single.role != crate::graph::AgentRole::Orchestrator {
                diags.push(
                    Diagnostic::suggestion(
                        "S101",
                        format!(
                            "Orchestrator-mode graph enters at '{}' ({:?}); consider an \
                             orchestrator entry node",
                            single.id, single.role
                        ),
                    )
                    .at_node(&single.id),
                );
            }
        }
    }

    for node in &graph.nodes {
        if node.config.parallel_eligible && graph.edges_from(&node.id).len() <= 1 {
            diags.push(
                Diagnostic::suggestion(
                    "S102",
                    format!(
                        "Node '{}' is parallel-eligible but has at most one outgoing edge; \
                         the flag has no effect",
                        node.id
                    ),
                )
                .at_node(&node.id),
            );
        }
    }
}
