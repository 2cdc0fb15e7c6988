//! Conflict resolution strategies and the severity-driven policy.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;

use crate::error::ConflictError;
use crate::store::{ArtifactStore, VersionedArtifact};

use super::detector::detect;
use super::types::{
    ArtifactConflict, ConflictSeverity, Resolution, ResolutionStrategy,
};

/// A concrete resolution request; the payload-carrying strategies take
/// their inputs here.
#[derive(Debug, Clone)]
pub enum ResolutionRequest {
    AutoMerge,
    LastWriteWins,
    FirstWriteWins,
    MergeBoth,
    Manual {
        content: Value,
        resolved_by: String,
    },
    /// Producer ranking, highest priority first.
    AgentPriority { ranking: Vec<String> },
}

impl ResolutionRequest {
    fn strategy(&self) -> ResolutionStrategy {
        match self {
            ResolutionRequest::AutoMerge => ResolutionStrategy::AutoMerge,
            ResolutionRequest::LastWriteWins => ResolutionStrategy::LastWriteWins,
            ResolutionRequest::FirstWriteWins => ResolutionStrategy::FirstWriteWins,
            ResolutionRequest::MergeBoth => ResolutionStrategy::MergeBoth,
            ResolutionRequest::Manual { .. } => ResolutionStrategy::Manual,
            ResolutionRequest::AgentPriority { .. } => ResolutionStrategy::AgentPriority,
        }
    }
}

/// Maps severity to a default strategy so routine conflicts resolve
/// without a human in the loop. `None` means manual resolution required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    Conservative,
    Aggressive,
    LastWriteWinsAlways,
}

impl ResolutionPolicy {
    pub fn default_strategy(&self, severity: ConflictSeverity) -> Option<ResolutionRequest> {
        match self {
            ResolutionPolicy::Conservative => match severity {
                ConflictSeverity::Low => Some(ResolutionRequest::AutoMerge),
                _ => None,
            },
            ResolutionPolicy::Aggressive => match severity {
                ConflictSeverity::Low | ConflictSeverity::Medium => {
                    Some(ResolutionRequest::AutoMerge)
                }
                ConflictSeverity::High => Some(ResolutionRequest::LastWriteWins),
                ConflictSeverity::Critical => None,
            },
            ResolutionPolicy::LastWriteWinsAlways => Some(ResolutionRequest::LastWriteWins),
        }
    }
}

/// Holds detected conflicts until they are resolved or discarded.
#[derive(Debug, Default)]
pub struct ConflictRegistry {
    conflicts: HashMap<String, ArtifactConflict>,
    order: Vec<String>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run detection and track the conflict if one is found. Returns the
    /// conflict id.
    pub fn detect_and_register(
        &mut self,
        store: &ArtifactStore,
        current_id: &str,
        incoming_id: &str,
    ) -> Result<Option<String>, crate::error::EngineError> {
        match detect(store, current_id, incoming_id)? {
            Some(conflict) => {
                let id = conflict.id.clone();
                self.order.push(id.clone());
                self.conflicts.insert(id.clone(), conflict);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ArtifactConflict> {
        self.conflicts.get(id)
    }

    /// All tracked conflicts in detection order.
    pub fn all(&self) -> Vec<&ArtifactConflict> {
        self.order
            .iter()
            .filter_map(|id| self.conflicts.get(id))
            .collect()
    }

    pub fn unresolved(&self) -> Vec<&ArtifactConflict> {
        self.all()
            .into_iter()
            .filter(|c| !c.is_resolved())
            .collect()
    }

    /// Apply a resolution strategy. On success the merged content is
    /// appended to the store as a new version derived from both sides, and
    /// the conflict's `resolution` is populated. A rejected strategy leaves
    /// the conflict unresolved.
    pub fn resolve(
        &mut self,
        store: &mut ArtifactStore,
        conflict_id: &str,
        request: ResolutionRequest,
    ) -> Result<&ArtifactConflict, ConflictError> {
        let conflict = self
            .conflicts
            .get(conflict_id)
            .ok_or_else(|| ConflictError::NotFound(conflict_id.to_string()))?;
        if conflict.is_resolved() {
            return Err(ConflictError::AlreadyResolved(conflict_id.to_string()));
        }

        let current = store
            .get(&conflict.current_version)
            .cloned()
            .ok_or_else(|| ConflictError::InvalidInput(conflict.current_version.clone()))?;
        let incoming = store
            .get(&conflict.incoming_version)
            .cloned()
            .ok_or_else(|| ConflictError::InvalidInput(conflict.incoming_version.clone()))?;
        let base = store
            .common_ancestor(&current.id, &incoming.id)
            .cloned();

        let mut notes = Vec::new();
        let (merged, resolved_by) = match &request {
            ResolutionRequest::LastWriteWins => {
                let winner = later_of(&current, &incoming);
                notes.push(format!("version {} wins by recency", winner.version));
                (winner.content.clone(), "engine:last-write-wins".to_string())
            }
            ResolutionRequest::FirstWriteWins => {
                let winner = earlier_of(&current, &incoming);
                notes.push(format!("version {} wins by precedence", winner.version));
                (winner.content.clone(), "engine:first-write-wins".to_string())
            }
            ResolutionRequest::AutoMerge => (
                auto_merge(&base, &current, &incoming, &mut notes),
                "engine:auto-merge".to_string(),
            ),
            ResolutionRequest::MergeBoth => (
                merge_both(&current.content, &incoming.content),
                "engine:merge-both".to_string(),
            ),
            ResolutionRequest::Manual {
                content,
                resolved_by,
            } => {
                store
                    .validate_against_schema(&conflict.artifact_path, content)
                    .map_err(ConflictError::SchemaViolation)?;
                (content.clone(), resolved_by.clone())
            }
            ResolutionRequest::AgentPriority { ranking } => {
                let winner = by_agent_priority(&current, &incoming, ranking)?;
                notes.push(format!(
                    "producer '{}' ranked highest",
                    winner.produced_by.clone().unwrap_or_default()
                ));
                (winner.content.clone(), "engine:agent-priority".to_string())
            }
        };

        let merged_version = store.put(
            &conflict.artifact_path,
            merged.clone(),
            vec![current.id.clone(), incoming.id.clone()],
        );
        tracing::debug!(
            path = %conflict.artifact_path,
            strategy = ?request.strategy(),
            merged_version = merged_version.version,
            "conflict resolved"
        );

        let conflict = self
            .conflicts
            .get_mut(conflict_id)
            .ok_or_else(|| ConflictError::NotFound(conflict_id.to_string()))?;
        conflict.resolution = Some(Resolution {
            strategy: request.strategy(),
            result: merged,
            resolved_by,
            timestamp: Utc::now(),
            notes,
        });
        Ok(conflict)
    }

    /// Resolve using the policy's default strategy for the conflict's
    /// severity. Rejected when the policy demands manual resolution.
    pub fn resolve_with_policy(
        &mut self,
        store: &mut ArtifactStore,
        conflict_id: &str,
        policy: ResolutionPolicy,
    ) -> Result<&ArtifactConflict, ConflictError> {
        let severity = self
            .conflicts
            .get(conflict_id)
            .ok_or_else(|| ConflictError::NotFound(conflict_id.to_string()))?
            .severity;
        let request = policy.default_strategy(severity).ok_or_else(|| {
            ConflictError::InvalidInput(format!(
                "severity {:?} requires manual resolution under {:?}",
                severity, policy
            ))
        })?;
        self.resolve(store, conflict_id, request)
    }
}

fn later_of<'a>(a: &'a VersionedArtifact, b: &'a VersionedArtifact) -> &'a VersionedArtifact {
    if a.version >= b.version {
        a
    } else {
        b
    }
}

fn earlier_of<'a>(a: &'a VersionedArtifact, b: &'a VersionedArtifact) -> &'a VersionedArtifact {
    if a.version <= b.version {
        a
    } else {
        b
    }
}

/// Apply both sides' changes where they touched different fields; where
/// both moved the same field, recency wins and the fallback is recorded.
fn auto_merge(
    base: &Option<VersionedArtifact>,
    current: &VersionedArtifact,
    incoming: &VersionedArtifact,
    notes: &mut Vec<String>,
) -> Value {
    let base_obj = base.as_ref().and_then(|b| b.content.as_object());
    let (Some(cur_obj), Some(inc_obj)) = (current.content.as_object(), incoming.content.as_object())
    else {
        let winner = later_of(current, incoming);
        notes.push("content not structured; fell back to last-write-wins".to_string());
        return winner.content.clone();
    };

    // base keys are in the union too, so a field both sides dropped is a
    // change like any other and stays dropped
    let mut merged = base_obj.cloned().unwrap_or_default();
    let mut keys: Vec<&String> = cur_obj
        .keys()
        .chain(inc_obj.keys())
        .chain(base_obj.into_iter().flat_map(|o| o.keys()))
        .collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let b = base_obj.and_then(|o| o.get(key));
        let c = cur_obj.get(key);
        let i = inc_obj.get(key);
        let cur_changed = c != b;
        let inc_changed = i != b;
        let chosen = match (cur_changed, inc_changed) {
            (false, false) => b,
            (true, false) => c,
            (false, true) => i,
            (true, true) if c == i => c,
            (true, true) => {
                let winner = later_of(current, incoming);
                notes.push(format!(
                    "field '{}' changed on both sides; last-write-wins applied",
                    key
                ));
                winner.content.get(key)
            }
        };
        match chosen {
            Some(v) => {
                merged.insert(key.clone(), v.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }
    Value::Object(merged)
}

/// Concatenation semantics for strings and arrays, structural union for
/// objects (incoming wins key collisions, current's exclusive keys stay).
fn merge_both(current: &Value, incoming: &Value) -> Value {
    match (current, incoming) {
        (Value::String(a), Value::String(b)) => Value::String(format!("{}\n{}", a, b)),
        (Value::Array(a), Value::Array(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Value::Array(items)
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        (a, b) => Value::Array(vec![a.clone(), b.clone()]),
    }
}

fn by_agent_priority<'a>(
    current: &'a VersionedArtifact,
    incoming: &'a VersionedArtifact,
    ranking: &[String],
) -> Result<&'a VersionedArtifact, ConflictError> {
    let rank = |a: &VersionedArtifact| -> Result<usize, ConflictError> {
        let producer = a
            .produced_by
            .as_deref()
            .ok_or_else(|| ConflictError::UnknownAgent(format!("version {}", a.version)))?;
        ranking
            .iter()
            .position(|r| r == producer)
            .ok_or_else(|| ConflictError::UnknownAgent(producer.to_string()))
    };
    let (cr, ir) = (rank(current)?, rank(incoming)?);
    Ok(if cr <= ir { current } else { incoming })
}
