//! Routing conditions attached to edges.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator used by `state-check` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompareOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Exists,
}

/// Routing predicate on an edge. Evaluation is pure and side-effect-free
/// given a state snapshot (see [`crate::evaluator`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoutingCondition {
    /// Unconditional traversal. The default for new edges.
    Always,
    /// Compare a state key against a literal value.
    StateCheck {
        key: String,
        operator: CompareOperator,
        #[serde(default)]
        value: Value,
    },
    /// True when any version of the artifact path has been produced.
    ArtifactExists { path: String },
    /// True when the artifact path exists and its latest version passed
    /// validation.
    ArtifactValid {
        path: String,
        #[serde(default)]
        schema_id: Option<String>,
    },
    /// True when the named counter has reached `max_iterations`.
    IterationLimit {
        max_iterations: u32,
        counter_key: String,
    },
    /// Restricted boolean expression over a read-only context
    /// (see [`crate::evaluator::expression`]).
    CustomExpression { expression: String },
}

impl Default for RoutingCondition {
    fn default() -> Self {
        RoutingCondition::Always
    }
}

impl RoutingCondition {
    /// State keys this condition reads, used by the validator's
    /// dead-condition check.
    pub fn referenced_state_keys(&self) -> Vec<&str> {
        match self {
            RoutingCondition::StateCheck { key, .. } => vec![key.as_str()],
            RoutingCondition::IterationLimit { counter_key, .. } => vec![counter_key.as_str()],
            _ => vec![],
        }
    }

    /// Artifact paths this condition reads.
    pub fn referenced_artifact_paths(&self) -> Vec<&str> {
        match self {
            RoutingCondition::ArtifactExists { path } => vec![path.as_str()],
            RoutingCondition::ArtifactValid { path, .. } => vec![path.as_str()],
            _ => vec![],
        }
    }
}
