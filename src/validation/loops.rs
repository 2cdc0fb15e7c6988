//! Loop consistency checks.

use crate::graph::{LoopRole, WorkflowGraph};

use super::types::Diagnostic;

pub fn check(graph: &WorkflowGraph, diags: &mut Vec<Diagnostic>) {
    // Every loop-role edge must belong to exactly one declared loop.
    for edge in &graph.edges {
        if edge.loop_role == LoopRole::None {
            continue;
        }
        let owners: Vec<&str> = graph
            .loops
            .iter()
            .filter(|l| l.contains(&edge.source) || l.contains(&edge.target))
            .map(|l| l.id.as_str())
            .collect();
        match owners.len() {
            0 => diags.push(
                Diagnostic::error(
                    "E201",
                    format!(
                        "Edge '{}' has loop role {:?} but belongs to no declared loop",
                        edge.id, edge.loop_role
                    ),
                )
                .at_edge(&edge.id),
            ),
            1 => {}
            _ => diags.push(
                Diagnostic::error(
                    "E201",
                    format!(
                        "Edge '{}' is claimed by multiple loops: {}",
                        edge.id,
                        owners.join(", ")
                    ),
                )
                .at_edge(&edge.id),
            ),
        }
    }

    for lp in &graph.loops {
        for member in lp
            .body
            .iter()
            .chain([&lp.entry_node, &lp.exit_node])
        {
            if graph.node(member).is_none() {
                diags.push(
                    Diagnostic::error(
                        "E202",
                        format!("Loop '{}' references missing node: {}", lp.id, member),
                    )
                    .at_node(member),
                );
            }
        }

        // iterate/return edges must stay inside the loop's node set.
        for edge in &graph.edges {
            let role = edge.loop_role;
            if role != LoopRole::Iterate && role != LoopRole::Return {
                continue;
            }
            if !lp.contains(&edge.source) {
                continue;
            }
            if !lp.contains(&edge.target) {
                diags.push(
                    Diagnostic::error(
                        "E203",
                        format!(
                            "{:?} edge '{}' leaves loop '{}' (target {} is outside the body)",
                            role, edge.id, lp.id, edge.target
                        ),
                    )
                    .at_edge(&edge.id),
                );
            }
        }

        if lp.max_iterations == 0 {
            diags.push(
                Diagnostic::warning(
                    "W204",
                    format!("Loop '{}' has max_iterations 0; the body never runs", lp.id),
                ),
            );
        }
    }
}
