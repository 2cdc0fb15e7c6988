//! End-to-end simulation scenarios: graphs defined the way the editor
//! serializes them, run through validation and the simulator.

use agentflow::graph::WorkflowGraph;
use agentflow::simulator::{
    start_simulation, Simulation, SimulationConfig, SimulationMode, SimulationStatus, StepEvent,
};
use agentflow::validation::validate;
use serde_json::json;

fn graph(json: serde_json::Value) -> WorkflowGraph {
    init_tracing();
    serde_json::from_value(json).expect("test graph deserializes")
}

/// Honor RUST_LOG when debugging a failing scenario.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn review_pipeline() -> WorkflowGraph {
    graph(json!({
        "name": "research-and-review",
        "nodes": [
            {"id": "plan", "role": "orchestrator",
             "config": {"parallel_eligible": true, "thinking_depth": "extended"}},
            {"id": "research", "role": "researcher", "outputs": ["findings.md"]},
            {"id": "draft", "role": "writer", "outputs": ["draft.md"]},
            {"id": "review", "role": "critic",
             "inputs": ["findings.md", "draft.md"], "outputs": ["review.md"]},
            {"id": "publish", "role": "finalizer", "inputs": ["review.md"]}
        ],
        "edges": [
            {"id": "e1", "source": "plan", "target": "research"},
            {"id": "e2", "source": "plan", "target": "draft"},
            {"id": "e3", "source": "research", "target": "review"},
            {"id": "e4", "source": "draft", "target": "review"},
            {"id": "e5", "source": "review", "target": "publish",
             "condition": {"type": "artifact-exists", "path": "review.md"}}
        ],
        "mode": "orchestrator"
    }))
}

#[test]
fn fan_out_pipeline_overlaps_branches() {
    let g = review_pipeline();
    assert!(validate(&g).is_valid);

    let result = start_simulation(g, SimulationConfig::default());
    assert_eq!(result.status, SimulationStatus::Completed);
    assert_eq!(result.steps.len(), 5);
    assert!((result.coverage_percentage - 100.0).abs() < f64::EPSILON);

    // research and draft run off the same fan-out and can overlap
    assert_eq!(result.peak_parallelism, 2);
    assert!(result
        .parallel_blocks
        .iter()
        .any(|b| b.contains(&"research".to_string()) && b.contains(&"draft".to_string())));

    // review waits on both branches, so wall-clock time is the critical
    // path, not the sum of all steps
    let sum: u64 = result.steps.iter().map(|s| s.estimated_time_ms).sum();
    assert!(result.total_estimated_time_ms < sum);
    assert!(result.critical_path.starts_with(&["plan".to_string()]));
    assert_eq!(result.critical_path.last().map(String::as_str), Some("publish"));

    // the reviewer saw both declared inputs resolved
    let review = result.steps.iter().find(|s| s.node_id == "review").unwrap();
    assert_eq!(review.resolved_inputs.len(), 2);
}

#[test]
fn untaken_branch_lowers_coverage() {
    let g = graph(json!({
        "name": "triage",
        "nodes": [
            {"id": "a", "role": "worker"},
            {"id": "b", "role": "finalizer"},
            {"id": "c", "role": "finalizer"}
        ],
        "edges": [
            {"id": "to-b", "source": "a", "target": "b",
             "condition": {"type": "state-check", "key": "escalate",
                           "operator": "equals", "value": true}},
            {"id": "to-c", "source": "a", "target": "c", "priority": 1}
        ]
    }));

    let mut config = SimulationConfig::default();
    config.mock_state.insert("escalate".into(), json!(false));
    let result = start_simulation(g, config);

    assert_eq!(result.status, SimulationStatus::Completed);
    let visited: Vec<&str> = result.steps.iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(visited, vec!["a", "c"]);
    assert!(result.coverage_percentage > 66.0 && result.coverage_percentage < 67.0);
}

#[test]
fn refinement_loop_terminates_at_cap() {
    let g = graph(json!({
        "name": "refine",
        "nodes": [
            {"id": "seed", "role": "worker"},
            {"id": "generate", "role": "writer", "outputs": ["candidate.md"]},
            {"id": "judge", "role": "critic"},
            {"id": "ship", "role": "finalizer"}
        ],
        "edges": [
            {"id": "e1", "source": "seed", "target": "generate", "loop_role": "entry"},
            {"id": "e2", "source": "generate", "target": "judge", "loop_role": "iterate"},
            {"id": "e3", "source": "judge", "target": "generate", "loop_role": "return"},
            {"id": "e4", "source": "judge", "target": "ship", "loop_role": "exit"}
        ],
        "loops": [{
            "id": "refinement",
            "entry_node": "generate",
            "exit_node": "judge",
            "body": ["generate", "judge"],
            "exit_condition": {"type": "state-check", "key": "score",
                               "operator": "greater-than", "value": 90},
            "max_iterations": 4,
            "counter_key": "refinement.round"
        }]
    }));
    assert!(validate(&g).is_valid);

    let result = start_simulation(g.clone(), SimulationConfig::default());
    assert_eq!(result.status, SimulationStatus::Completed);
    let rounds = result.steps.iter().filter(|s| s.node_id == "generate").count();
    assert_eq!(rounds, 4);
    assert!(result.warnings.iter().any(|w| w.contains("refinement")));
    assert!(result.bottlenecks.iter().any(|b| b.reason.contains("refinement")));

    // a satisfied exit condition ends the loop on round one, no warning
    let mut config = SimulationConfig::default();
    config.mock_state.insert("score".into(), json!(95));
    let early = start_simulation(g, config);
    assert_eq!(early.status, SimulationStatus::Completed);
    assert_eq!(early.steps.iter().filter(|s| s.node_id == "generate").count(), 1);
    assert!(early.warnings.is_empty());
}

#[test]
fn custom_expression_routes_on_state() {
    let g = graph(json!({
        "name": "expr",
        "nodes": [
            {"id": "score", "role": "worker"},
            {"id": "accept", "role": "finalizer"},
            {"id": "reject", "role": "finalizer"}
        ],
        "edges": [
            {"id": "ok", "source": "score", "target": "accept",
             "condition": {"type": "custom-expression",
                           "expression": "state.points >= 80 && !state.flagged"}},
            {"id": "nope", "source": "score", "target": "reject", "priority": 1}
        ]
    }));

    let mut config = SimulationConfig::default();
    config.mock_state.insert("points".into(), json!(85));
    config.mock_state.insert("flagged".into(), json!(false));
    let result = start_simulation(g.clone(), config);
    assert_eq!(result.steps[0].chosen_next, vec!["accept"]);

    // a malformed expression degrades to false and the fallback edge wins
    let mut broken = g;
    broken.edges[0].condition = agentflow::graph::RoutingCondition::CustomExpression {
        expression: "state.points >= ".into(),
    };
    let result = start_simulation(broken, SimulationConfig::default());
    assert_eq!(result.steps[0].chosen_next, vec!["reject"]);
}

#[test]
fn simulation_is_idempotent() {
    let run = || {
        let result = start_simulation(review_pipeline(), SimulationConfig::default());
        serde_json::to_string(&result).expect("result serializes")
    };
    let first = run();
    assert_eq!(first, run());
    assert_eq!(first, run());
}

#[test]
fn step_by_step_with_breakpoint_and_cancel() {
    let config = SimulationConfig {
        mode: SimulationMode::Breakpoints,
        breakpoints: vec!["review".into()],
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(review_pipeline(), config);

    let mut hits = 0;
    loop {
        match sim.step() {
            StepEvent::BreakpointHit(node) => {
                assert_eq!(node, "review");
                hits += 1;
                break;
            }
            StepEvent::Step(_) => continue,
            StepEvent::Finished => panic!("hit the end before the breakpoint"),
        }
    }
    assert_eq!(hits, 1);

    let result = sim.cancel();
    assert_eq!(result.status, SimulationStatus::Cancelled);
    // everything before the breakpoint is in the trace, the rest is not
    assert!(result.steps.iter().all(|s| s.node_id != "review"));
    assert!(!result.steps.is_empty());
}

#[test]
fn validation_errors_fail_fast() {
    let g = graph(json!({
        "name": "broken",
        "nodes": [{"id": "a", "role": "worker"}],
        "edges": [{"id": "e1", "source": "a", "target": "missing"}]
    }));
    let result = start_simulation(g, SimulationConfig::default());
    assert_eq!(result.status, SimulationStatus::Failed);
    assert!(result.steps.is_empty());
    assert!(!result.errors.is_empty());
}

#[test]
fn empty_graph_is_valid_and_completes_empty() {
    let g = graph(json!({"name": "empty"}));
    assert!(validate(&g).is_valid);
    let result = start_simulation(g, SimulationConfig::default());
    assert_eq!(result.status, SimulationStatus::Completed);
    assert!(result.steps.is_empty());
    assert!((result.coverage_percentage - 100.0).abs() < f64::EPSILON);
}

#[test]
fn critical_path_time_is_monotonic_in_node_cost() {
    let base = review_pipeline();
    let baseline = start_simulation(base.clone(), SimulationConfig::default());

    // deepening a critical-path node cannot shorten the schedule
    let mut slower = base;
    for node in &mut slower.nodes {
        if node.id == "review" {
            node.config.thinking_depth = agentflow::graph::ThinkingDepth::Extended;
            node.prompt_template = "consider every angle ".repeat(50);
        }
    }
    let result = start_simulation(slower, SimulationConfig::default());
    assert!(result.total_estimated_time_ms > baseline.total_estimated_time_ms);
    assert!(result.total_estimated_cost > baseline.total_estimated_cost);
}
