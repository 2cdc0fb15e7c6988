//! Condition evaluation.
//!
//! Pure and total: given a state snapshot, an artifact set, and the current
//! node id, every routing condition evaluates to a `bool`. Unknown state
//! keys behave as absent. Malformed custom expressions degrade the one
//! edge to `false` with a warning instead of aborting traversal.

pub mod condition;
pub mod expression;
pub mod operators;

pub use condition::evaluate;

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::store::ValidationStatus;

/// Read-only-from-the-evaluator's-perspective snapshot of mock state and
/// produced artifacts. The simulator owns and mutates it between steps.
#[derive(Debug, Clone, Default)]
pub struct SimState {
    state: Map<String, Value>,
    artifacts: HashMap<String, ValidationStatus>,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: Map<String, Value>) -> Self {
        Self {
            state,
            artifacts: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Numeric counter read; absent or non-numeric counts as 0.
    pub fn counter(&self, key: &str) -> u64 {
        self.state
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn increment_counter(&mut self, key: &str) -> u64 {
        let next = self.counter(key) + 1;
        self.state.insert(key.to_string(), Value::from(next));
        next
    }

    pub fn produce_artifact(&mut self, path: impl Into<String>, status: ValidationStatus) {
        self.artifacts.insert(path.into(), status);
    }

    pub fn artifact_exists(&self, path: &str) -> bool {
        self.artifacts.contains_key(path)
    }

    pub fn artifact_valid(&self, path: &str) -> bool {
        matches!(self.artifacts.get(path), Some(ValidationStatus::Valid))
    }
}
