//! Post-traversal analysis over the realized step DAG.
//!
//! The trace produced by the engine already has loops unrolled and fan-outs
//! joined, so every analysis here is plain DAG arithmetic over step indices
//! (`depends_on` always points backwards).

use std::collections::HashSet;

use crate::graph::{GraphIndex, WorkflowGraph};

use super::trace::{Bottleneck, SimulationStep};

pub(crate) struct Analysis {
    pub critical_path: Vec<String>,
    pub parallel_blocks: Vec<Vec<String>>,
    pub peak_parallelism: usize,
    pub bottlenecks: Vec<Bottleneck>,
    pub coverage_percentage: f64,
    pub total_estimated_time_ms: u64,
    pub total_estimated_cost: f64,
}

pub(crate) fn analyze(
    graph: &WorkflowGraph,
    steps: &[SimulationStep],
    bottleneck_threshold: f64,
) -> Analysis {
    let (path_indices, total_time) = critical_path_indices(steps);
    let ancestors = ancestor_sets(steps);
    let eligible: Vec<bool> = steps
        .iter()
        .map(|s| {
            graph
                .node(&s.node_id)
                .map(|n| n.config.parallel_eligible)
                .unwrap_or(false)
        })
        .collect();
    let parallel_blocks = parallel_blocks(steps, &ancestors, &eligible);
    let peak_parallelism = parallel_blocks
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(usize::from(!steps.is_empty()));

    Analysis {
        critical_path: path_indices
            .iter()
            .map(|&i| steps[i].node_id.clone())
            .collect(),
        parallel_blocks,
        peak_parallelism,
        bottlenecks: bottlenecks(steps, &path_indices, bottleneck_threshold),
        coverage_percentage: coverage(graph, steps),
        total_estimated_time_ms: total_time,
        total_estimated_cost: steps.iter().map(|s| s.estimated_cost).sum(),
    }
}

/// Longest cumulative-time path through the trace. Returns the step indices
/// along the path and its total time, which is the simulated wall-clock
/// duration (independent branches overlap).
fn critical_path_indices(steps: &[SimulationStep]) -> (Vec<usize>, u64) {
    if steps.is_empty() {
        return (vec![], 0);
    }
    let mut finish = vec![0u64; steps.len()];
    let mut pred: Vec<Option<usize>> = vec![None; steps.len()];
    for (i, step) in steps.iter().enumerate() {
        let (base, p) = step
            .depends_on
            .iter()
            .map(|&d| (finish[d], Some(d)))
            .max_by_key(|(f, _)| *f)
            .unwrap_or((0, None));
        finish[i] = base + step.estimated_time_ms;
        pred[i] = p;
    }
    let mut end = 0;
    for i in 1..steps.len() {
        if finish[i] > finish[end] {
            end = i;
        }
    }
    let mut path = vec![end];
    let mut cursor = end;
    while let Some(p) = pred[cursor] {
        path.push(p);
        cursor = p;
    }
    path.reverse();
    (path, finish[end])
}

/// Transitive dependency closure per step.
fn ancestor_sets(steps: &[SimulationStep]) -> Vec<HashSet<usize>> {
    let mut ancestors: Vec<HashSet<usize>> = Vec::with_capacity(steps.len());
    for step in steps {
        let mut set = HashSet::new();
        for &d in &step.depends_on {
            set.insert(d);
            set.extend(ancestors[d].iter().copied());
        }
        ancestors.push(set);
    }
    ancestors
}

/// Greedy grouping of steps that can overlap. Two steps share a block when
/// neither is an ancestor of the other and both descend from the same
/// parallel-eligible fan-out step; independent steps that merely happen to
/// coexist (say, two disconnected chains) are not parallelism. Singleton
/// groups are not reported.
fn parallel_blocks(
    steps: &[SimulationStep],
    ancestors: &[HashSet<usize>],
    eligible: &[bool],
) -> Vec<Vec<String>> {
    // per step, the parallel-eligible ancestors it fanned out from
    let mut fan_roots: Vec<HashSet<usize>> = Vec::with_capacity(steps.len());
    for step in steps {
        let mut set = HashSet::new();
        for &d in &step.depends_on {
            if eligible[d] {
                set.insert(d);
            }
            set.extend(fan_roots[d].iter().copied());
        }
        fan_roots.push(set);
    }
    let independent = |a: usize, b: usize| {
        !ancestors[a].contains(&b)
            && !ancestors[b].contains(&a)
            && steps[a].node_id != steps[b].node_id
            && !fan_roots[a].is_disjoint(&fan_roots[b])
    };
    let mut assigned = vec![false; steps.len()];
    let mut blocks = Vec::new();
    for i in 0..steps.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut block = vec![i];
        for j in (i + 1)..steps.len() {
            if assigned[j] {
                continue;
            }
            if block.iter().all(|&m| independent(m, j)) {
                assigned[j] = true;
                block.push(j);
            }
        }
        if block.len() >= 2 {
            blocks.push(block.iter().map(|&ix| steps[ix].node_id.clone()).collect());
        }
    }
    blocks
}

/// Critical-path steps whose time or token estimate dominates the per-step
/// mean by more than the configured factor.
fn bottlenecks(
    steps: &[SimulationStep],
    path_indices: &[usize],
    threshold: f64,
) -> Vec<Bottleneck> {
    if steps.is_empty() {
        return vec![];
    }
    let mean_time =
        steps.iter().map(|s| s.estimated_time_ms).sum::<u64>() as f64 / steps.len() as f64;
    let mean_tokens =
        steps.iter().map(|s| s.estimated_tokens).sum::<u64>() as f64 / steps.len() as f64;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for &i in path_indices {
        let step = &steps[i];
        if !seen.insert(step.node_id.as_str()) {
            continue;
        }
        if step.estimated_time_ms as f64 > threshold * mean_time {
            out.push(Bottleneck {
                node_id: step.node_id.clone(),
                reason: format!(
                    "estimated time {}ms is more than {:.1}x the per-step mean of {:.0}ms",
                    step.estimated_time_ms, threshold, mean_time
                ),
            });
        } else if step.estimated_tokens as f64 > threshold * mean_tokens {
            out.push(Bottleneck {
                node_id: step.node_id.clone(),
                reason: format!(
                    "estimated {} tokens is more than {:.1}x the per-step mean of {:.0}",
                    step.estimated_tokens, threshold, mean_tokens
                ),
            });
        }
    }
    out
}

/// Distinct visited nodes over nodes reachable from the entry points.
fn coverage(graph: &WorkflowGraph, steps: &[SimulationStep]) -> f64 {
    let entries: Vec<String> = graph.entry_nodes().iter().map(|n| n.id.clone()).collect();
    let reachable = GraphIndex::build(graph).reachable_from(&entries);
    if reachable.is_empty() {
        return 100.0;
    }
    let visited: HashSet<&str> = steps
        .iter()
        .map(|s| s.node_id.as_str())
        .filter(|id| reachable.contains(*id))
        .collect();
    visited.len() as f64 / reachable.len() as f64 * 100.0
}
