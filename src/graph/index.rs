//! Petgraph-backed index over a [`WorkflowGraph`].
//!
//! The id-keyed model stays the source of truth; the index gives the
//! validator and the simulator cheap successor/predecessor/reachability
//! queries. Edges with dangling endpoints are skipped here — the validator
//! reports them from the raw model.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use super::types::{LoopRole, WorkflowGraph};

/// Node id to petgraph NodeIndex mapping.
pub type NodeIndexMap = HashMap<String, NodeIndex>;

/// Read-only structural index. Node weights are node ids; edge weights are
/// indices into `WorkflowGraph::edges`.
pub struct GraphIndex {
    graph: StableDiGraph<String, usize>,
    node_index_map: NodeIndexMap,
}

impl GraphIndex {
    pub fn build(wf: &WorkflowGraph) -> Self {
        let mut graph = StableDiGraph::new();
        let mut node_index_map = NodeIndexMap::new();

        for node in &wf.nodes {
            let idx = graph.add_node(node.id.clone());
            node_index_map.insert(node.id.clone(), idx);
        }

        for (i, edge) in wf.edges.iter().enumerate() {
            let (Some(&s), Some(&t)) = (
                node_index_map.get(&edge.source),
                node_index_map.get(&edge.target),
            ) else {
                continue;
            };
            graph.add_edge(s, t, i);
        }

        Self {
            graph,
            node_index_map,
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node_index_map.contains_key(node_id)
    }

    pub fn successors(&self, node_id: &str) -> Vec<String> {
        let Some(&idx) = self.node_index_map.get(node_id) else {
            return vec![];
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    pub fn predecessors(&self, node_id: &str) -> Vec<String> {
        let Some(&idx) = self.node_index_map.get(node_id) else {
            return vec![];
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// BFS over the full edge set from the given entry points.
    pub fn reachable_from(&self, entries: &[String]) -> HashSet<String> {
        let mut reachable: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        for e in entries {
            if self.contains(e) && reachable.insert(e.clone()) {
                queue.push_back(e.clone());
            }
        }
        while let Some(node) = queue.pop_front() {
            for next in self.successors(&node) {
                if reachable.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }
        reachable
    }

    /// Nodes reachable from `node_id` following only non-`return` edges.
    /// Used by the dead-condition check: state produced "upstream" of an
    /// edge means produced by some node from which the edge's source is
    /// reachable.
    pub fn upstream_of(&self, wf: &WorkflowGraph, node_id: &str) -> HashSet<String> {
        let mut upstream: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(node_id.to_string());
        upstream.insert(node_id.to_string());
        while let Some(current) = queue.pop_front() {
            let Some(&idx) = self.node_index_map.get(&current) else {
                continue;
            };
            for edge_ref in self
                .graph
                .edges_directed(idx, petgraph::Direction::Incoming)
            {
                let edge = &wf.edges[*edge_ref.weight()];
                if edge.loop_role == LoopRole::Return {
                    continue;
                }
                if upstream.insert(edge.source.clone()) {
                    queue.push_back(edge.source.clone());
                }
            }
        }
        upstream
    }
}
