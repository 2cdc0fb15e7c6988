//! Cooperative simulation engine.
//!
//! The simulation is single-threaded and caller-driven: `step()` executes
//! one node visit and yields, `run()` drives to completion. Validation runs
//! before any traversal; a graph with errors never starts. All estimates
//! are deterministic functions of the node definition, so simulating the
//! same graph and config twice produces identical results.

use std::collections::VecDeque;

use serde_json::Value;

use crate::evaluator::{evaluate, SimState};
use crate::graph::{AgentNode, Edge, GraphIndex, LoopRole, ThinkingDepth, WorkflowGraph};
use crate::store::ValidationStatus;
use crate::validation::validate;

use super::analysis::analyze;
use super::config::{SimulationConfig, SimulationMode};
use super::trace::{Bottleneck, SimulationResult, SimulationStatus, SimulationStep, StepEvent};

/// A node visit waiting in the frontier.
struct Pending {
    node_id: String,
    depends_on: Vec<usize>,
    announced: bool,
}

enum Verdict {
    Take,
    Skip,
    ForcedExit { loop_id: String, max_iterations: u32 },
}

/// Validate, then run `graph` to completion under `config`.
pub fn start_simulation(graph: WorkflowGraph, config: SimulationConfig) -> SimulationResult {
    Simulation::new(graph, config).run()
}

pub struct Simulation {
    graph: WorkflowGraph,
    index: GraphIndex,
    config: SimulationConfig,
    state: SimState,
    frontier: VecDeque<Pending>,
    steps: Vec<SimulationStep>,
    warnings: Vec<String>,
    errors: Vec<String>,
    bottlenecks: Vec<Bottleneck>,
    status: Option<SimulationStatus>,
}

impl Simulation {
    /// Validate the graph and prepare the frontier. Validation errors put
    /// the simulation directly into `Failed` with the findings as errors;
    /// warnings and suggestions do not block.
    pub fn new(graph: WorkflowGraph, config: SimulationConfig) -> Self {
        let report = validate(&graph);
        let index = GraphIndex::build(&graph);
        let state = SimState::from_state(config.mock_state.clone());
        let mut sim = Self {
            graph,
            index,
            config,
            state,
            frontier: VecDeque::new(),
            steps: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            bottlenecks: Vec::new(),
            status: None,
        };
        if !report.is_valid {
            sim.errors = report.errors().iter().map(|d| d.to_string()).collect();
            sim.status = Some(SimulationStatus::Failed);
            return sim;
        }
        let entries: Vec<String> = sim
            .graph
            .entry_nodes()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        for node_id in entries {
            sim.frontier.push_back(Pending {
                node_id,
                depends_on: vec![],
                announced: false,
            });
        }
        sim
    }

    pub fn status(&self) -> Option<SimulationStatus> {
        self.status
    }

    pub fn steps(&self) -> &[SimulationStep] {
        &self.steps
    }

    /// Execute the next node visit. In breakpoint mode a visit to a listed
    /// node yields `BreakpointHit` once before executing.
    pub fn step(&mut self) -> StepEvent {
        if self.status.is_some() {
            return StepEvent::Finished;
        }
        let Some(mut pending) = self
            .next_ready_index()
            .and_then(|ix| self.frontier.remove(ix))
        else {
            self.status = Some(SimulationStatus::Completed);
            return StepEvent::Finished;
        };

        if self.config.mode == SimulationMode::Breakpoints
            && !pending.announced
            && self.config.breakpoints.contains(&pending.node_id)
        {
            let node_id = pending.node_id.clone();
            pending.announced = true;
            self.frontier.push_front(pending);
            return StepEvent::BreakpointHit(node_id);
        }

        if self.steps.len() as u32 >= self.config.max_steps {
            self.errors.push(format!(
                "step budget exceeded after {} steps",
                self.steps.len()
            ));
            self.status = Some(SimulationStatus::Failed);
            return StepEvent::Finished;
        }

        let Some(node) = self.graph.node(&pending.node_id).cloned() else {
            self.errors
                .push(format!("routed to unknown node '{}'", pending.node_id));
            self.status = Some(SimulationStatus::Failed);
            return StepEvent::Finished;
        };

        let index = self.steps.len();
        let tokens = estimate_tokens(&node);
        let time_ms = estimate_time_ms(&node, tokens);
        let cost = tokens as f64 * self.config.cost_per_token;

        let resolved_inputs: Vec<String> = node
            .inputs
            .iter()
            .filter(|path| self.state.artifact_exists(path))
            .cloned()
            .collect();
        // simulated nodes always succeed: outputs materialize as valid
        for output in &node.outputs {
            self.state
                .produce_artifact(output.clone(), ValidationStatus::Valid);
        }
        self.state
            .set(format!("{}.completed", node.id), Value::Bool(true));

        let chosen = self.choose_edges(&node);
        let chosen_next: Vec<String> = chosen.iter().map(|e| e.target.clone()).collect();
        for target in &chosen_next {
            self.enqueue(target, index);
        }

        tracing::debug!(node = %node.id, next = ?chosen_next, "simulated step");
        self.steps.push(SimulationStep {
            index,
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            resolved_inputs,
            produced_outputs: node.outputs.clone(),
            estimated_tokens: tokens,
            estimated_time_ms: time_ms,
            estimated_cost: cost,
            chosen_next,
            depends_on: pending.depends_on,
        });
        StepEvent::Step(index)
    }

    /// Drive to completion (through breakpoints) and return the result.
    pub fn run(&mut self) -> SimulationResult {
        while !matches!(self.step(), StepEvent::Finished) {}
        self.result()
    }

    /// Stop here; the result carries the partial trace.
    pub fn cancel(&mut self) -> SimulationResult {
        if self.status.is_none() {
            self.status = Some(SimulationStatus::Cancelled);
        }
        self.result()
    }

    /// Snapshot the outcome. Called before the simulation finishes this
    /// reports the partial trace as cancelled.
    pub fn result(&self) -> SimulationResult {
        let analysis = analyze(
            &self.graph,
            &self.steps,
            self.config.bottleneck_threshold,
        );
        let mut bottlenecks = self.bottlenecks.clone();
        bottlenecks.extend(analysis.bottlenecks);
        SimulationResult {
            status: self.status.unwrap_or(SimulationStatus::Cancelled),
            steps: self.steps.clone(),
            critical_path: analysis.critical_path,
            parallel_blocks: analysis.parallel_blocks,
            peak_parallelism: analysis.peak_parallelism,
            bottlenecks,
            coverage_percentage: analysis.coverage_percentage,
            total_estimated_cost: analysis.total_estimated_cost,
            total_estimated_time_ms: analysis.total_estimated_time_ms,
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }

    pub fn into_result(self) -> SimulationResult {
        self.result()
    }

    /// Queue a routed-to node. A target already waiting in the frontier
    /// gains an extra dependency instead of a second visit, which is how
    /// fan-out joins back together.
    fn enqueue(&mut self, node_id: &str, from_step: usize) {
        if let Some(pending) = self
            .frontier
            .iter_mut()
            .find(|p| p.node_id == node_id)
        {
            if !pending.depends_on.contains(&from_step) {
                pending.depends_on.push(from_step);
            }
            return;
        }
        self.frontier.push_back(Pending {
            node_id: node_id.to_string(),
            depends_on: vec![from_step],
            announced: false,
        });
    }

    /// The next frontier slot to execute: the first pending that no other
    /// pending still precedes topologically. A join stays queued until every
    /// branch that can still reach it has run, so it executes exactly once
    /// even when the branches differ in depth. Pendings on a mutual cycle
    /// never precede each other, so queue order decides and the walk cannot
    /// stall.
    fn next_ready_index(&self) -> Option<usize> {
        let n = self.frontier.len();
        if n == 0 {
            return None;
        }
        (0..n)
            .find(|&i| {
                !(0..n).any(|j| {
                    j != i
                        && self.frontier[j].node_id != self.frontier[i].node_id
                        && self.strictly_precedes(
                            &self.frontier[j].node_id,
                            &self.frontier[i].node_id,
                        )
                })
            })
            .or(Some(0))
    }

    /// `a` can reach `b` along graph edges but not the other way around.
    fn strictly_precedes(&self, a: &str, b: &str) -> bool {
        self.index.reachable_from(&[a.to_string()]).contains(b)
            && !self.index.reachable_from(&[b.to_string()]).contains(a)
    }

    /// Pick the outgoing edges to traverse: all satisfied edges for a
    /// parallel-eligible node, otherwise the satisfied edge with the lowest
    /// priority (declaration order breaks ties). Traversed loop entry and
    /// return edges advance the loop counter.
    fn choose_edges(&mut self, node: &AgentNode) -> Vec<Edge> {
        let out: Vec<Edge> = self
            .graph
            .edges_from(&node.id)
            .into_iter()
            .cloned()
            .collect();

        let mut eligible: Vec<(usize, Edge)> = Vec::new();
        for (ix, edge) in out.into_iter().enumerate() {
            match self.edge_verdict(&node.id, &edge) {
                Verdict::Take => eligible.push((ix, edge)),
                Verdict::Skip => {}
                Verdict::ForcedExit {
                    loop_id,
                    max_iterations,
                } => {
                    tracing::warn!(%loop_id, max_iterations, "loop iteration cap hit, forcing exit");
                    self.warnings.push(format!(
                        "loop '{}' hit its iteration cap ({}); exit forced",
                        loop_id, max_iterations
                    ));
                    self.bottlenecks.push(Bottleneck {
                        node_id: node.id.clone(),
                        reason: format!(
                            "loop '{}' exhausted all {} iterations without meeting its exit condition",
                            loop_id, max_iterations
                        ),
                    });
                    eligible.push((ix, edge));
                }
            }
        }

        let chosen: Vec<Edge> = if node.config.parallel_eligible {
            eligible.into_iter().map(|(_, e)| e).collect()
        } else {
            eligible
                .into_iter()
                .min_by_key(|(ix, e)| (e.priority, *ix))
                .map(|(_, e)| vec![e])
                .unwrap_or_default()
        };

        for edge in &chosen {
            if matches!(edge.loop_role, LoopRole::Entry | LoopRole::Return) {
                let counter_key = self
                    .graph
                    .loop_for_edge(edge)
                    .map(|l| l.counter_key.clone());
                if let Some(key) = counter_key {
                    self.state.increment_counter(&key);
                }
            }
        }
        chosen
    }

    /// Loop-aware edge eligibility. Return and exit edges are governed by
    /// the owning loop's exit condition and iteration cap rather than the
    /// edge's own condition.
    fn edge_verdict(&self, node_id: &str, edge: &Edge) -> Verdict {
        match (edge.loop_role, self.graph.loop_for_edge(edge)) {
            (LoopRole::Return, Some(lp)) => {
                let exit_met = evaluate(&lp.exit_condition, &self.state, node_id);
                let capped = self.state.counter(&lp.counter_key) >= u64::from(lp.max_iterations);
                if !exit_met && !capped {
                    Verdict::Take
                } else {
                    Verdict::Skip
                }
            }
            (LoopRole::Exit, Some(lp)) => {
                if evaluate(&lp.exit_condition, &self.state, node_id) {
                    Verdict::Take
                } else if self.state.counter(&lp.counter_key) >= u64::from(lp.max_iterations) {
                    Verdict::ForcedExit {
                        loop_id: lp.id.clone(),
                        max_iterations: lp.max_iterations,
                    }
                } else {
                    Verdict::Skip
                }
            }
            _ => {
                if evaluate(&edge.condition, &self.state, node_id) {
                    Verdict::Take
                } else {
                    Verdict::Skip
                }
            }
        }
    }
}

fn depth_base_tokens(depth: ThinkingDepth) -> u64 {
    match depth {
        ThinkingDepth::Minimal => 256,
        ThinkingDepth::Balanced => 1024,
        ThinkingDepth::Extended => 4096,
    }
}

fn depth_base_time_ms(depth: ThinkingDepth) -> u64 {
    match depth {
        ThinkingDepth::Minimal => 500,
        ThinkingDepth::Balanced => 2_000,
        ThinkingDepth::Extended => 8_000,
    }
}

fn estimate_tokens(node: &AgentNode) -> u64 {
    depth_base_tokens(node.config.thinking_depth) + node.prompt_template.len() as u64 / 4
}

fn estimate_time_ms(node: &AgentNode, tokens: u64) -> u64 {
    depth_base_time_ms(node.config.thinking_depth) + tokens / 10
}
