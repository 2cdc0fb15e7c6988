//! Condition-reference and edge-policy checks.
//!
//! A condition reading a key or artifact nothing upstream can produce is a
//! dead condition. It is reported as a warning, never an error: mock state
//! may be externally seeded, so the engine cannot prove the branch dead.

use std::collections::HashSet;

use crate::graph::{GraphIndex, RoutingCondition, WorkflowGraph};

use super::types::Diagnostic;

pub fn check(graph: &WorkflowGraph, index: &GraphIndex, diags: &mut Vec<Diagnostic>) {
    for edge in &graph.edges {
        if edge.condition == RoutingCondition::Always {
            continue;
        }
        if graph.node(&edge.source).is_none() {
            // dangling edges are already an E101; nothing upstream to inspect
            continue;
        }

        let upstream = index.upstream_of(graph, &edge.source);
        let artifacts = upstream_artifacts(graph, &upstream);
        let state_keys = upstream_state_keys(graph, &upstream);

        for key in edge.condition.referenced_state_keys() {
            if !state_keys.contains(key) {
                diags.push(
                    Diagnostic::warning(
                        "W201",
                        format!(
                            "Condition on edge '{}' reads state key '{}' that no upstream \
                             node produces (may be externally seeded)",
                            edge.id, key
                        ),
                    )
                    .at_edge(&edge.id),
                );
            }
        }

        for path in edge.condition.referenced_artifact_paths() {
            if !artifacts.contains(path) {
                diags.push(
                    Diagnostic::warning(
                        "W202",
                        format!(
                            "Condition on edge '{}' reads artifact '{}' that no upstream \
                             node produces",
                            edge.id, path
                        ),
                    )
                    .at_edge(&edge.id),
                );
            }
        }
    }

    for edge in &graph.edges {
        if let Some(resilience) = &edge.resilience {
            if resilience.response_timeout_ms > resilience.execution_timeout_ms {
                diags.push(
                    Diagnostic::error(
                        "E301",
                        format!(
                            "Edge '{}' response timeout ({}ms) exceeds execution timeout ({}ms)",
                            edge.id, resilience.response_timeout_ms, resilience.execution_timeout_ms
                        ),
                    )
                    .at_edge(&edge.id),
                );
            }
            if resilience.total_timeout_ms < resilience.execution_timeout_ms {
                diags.push(
                    Diagnostic::warning(
                        "W301",
                        format!(
                            "Edge '{}' total timeout ({}ms) is below its execution timeout ({}ms)",
                            edge.id, resilience.total_timeout_ms, resilience.execution_timeout_ms
                        ),
                    )
                    .at_edge(&edge.id),
                );
            }
        }
    }
}

fn upstream_artifacts<'a>(graph: &'a WorkflowGraph, upstream: &HashSet<String>) -> HashSet<&'a str> {
    graph
        .nodes
        .iter()
        .filter(|n| upstream.contains(&n.id))
        .flat_map(|n| n.outputs.iter().map(String::as_str))
        .collect()
}

/// State keys an upstream node can write during simulation: its completion
/// marker plus the counter keys of any loop it participates in.
fn upstream_state_keys(graph: &WorkflowGraph, upstream: &HashSet<String>) -> HashSet<String> {
    let mut keys: HashSet<String> = upstream
        .iter()
        .map(|id| format!("{}.completed", id))
        .collect();
    for lp in &graph.loops {
        if upstream.iter().any(|id| lp.contains(id)) {
            keys.insert(lp.counter_key.clone());
        }
    }
    keys
}
