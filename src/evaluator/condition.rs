//! Routing condition evaluation.

use crate::graph::RoutingCondition;

use super::expression;
use super::operators::compare;
use super::SimState;

/// Evaluate a routing condition against the state snapshot. Pure and total:
/// never panics, never errors; malformed custom expressions evaluate to
/// `false` with a warning.
pub fn evaluate(condition: &RoutingCondition, state: &SimState, current_node: &str) -> bool {
    match condition {
        RoutingCondition::Always => true,
        RoutingCondition::StateCheck {
            key,
            operator,
            value,
        } => compare(*operator, state.get(key), value),
        RoutingCondition::ArtifactExists { path } => state.artifact_exists(path),
        RoutingCondition::ArtifactValid { path, .. } => state.artifact_valid(path),
        RoutingCondition::IterationLimit {
            max_iterations,
            counter_key,
        } => state.counter(counter_key) >= u64::from(*max_iterations),
        RoutingCondition::CustomExpression { expression } => {
            expression::evaluate_expression(expression, state, current_node)
        }
    }
}
