//! Append-only, content-addressed version history per artifact path.
//!
//! Artifacts are immutable once created: "editing" means producing a new
//! version linked through `previous_version`. Version numbers per path are
//! contiguous and strictly increasing from 1. The hash is an integrity
//! check (identical content at different times hashes identically but still
//! gets a fresh version number), not a security boundary.
//!
//! The store is single-writer by design; all mutation goes through
//! `&mut self`. An adaptation for a concurrent executor would need to
//! serialize `put` per path to preserve the version invariant.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

pub type ArtifactId = String;

/// Outcome of validating an artifact version against its declared schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Unknown,
}

/// One immutable version of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedArtifact {
    pub id: ArtifactId,
    /// Logical name, stable across versions.
    pub path: String,
    /// 1-based, contiguous per path.
    pub version: u32,
    /// Hex sha-256 of the canonical JSON encoding of `content`.
    pub hash: String,
    pub size_bytes: usize,
    pub content: Value,
    /// Ids of the artifacts this one was computed from.
    pub derived_from: Vec<ArtifactId>,
    pub previous_version: Option<ArtifactId>,
    pub validation_status: ValidationStatus,
    pub critical: bool,
    /// Agent node that produced this version, when known. Consumed by the
    /// agent-priority conflict strategy.
    pub produced_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full version history of one path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHistory {
    pub versions: Vec<VersionedArtifact>,
    pub current_version: u32,
    pub total_versions: usize,
}

/// Derivation neighborhood of one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub artifact: VersionedArtifact,
    /// Artifacts this one was derived from.
    pub parents: Vec<VersionedArtifact>,
    /// Artifacts derived from this one.
    pub children: Vec<VersionedArtifact>,
}

/// Deterministic content hash. serde_json serializes object keys in sorted
/// order, so structurally equal content hashes equally.
pub fn content_hash(content: &Value) -> String {
    let bytes = serde_json::to_vec(content).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("{:x}", digest)
}

/// In-memory append-only store.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    by_id: HashMap<ArtifactId, VersionedArtifact>,
    by_path: HashMap<String, Vec<ArtifactId>>,
    critical_paths: HashSet<String>,
    /// Path → required top-level keys. Drives validation on `put` and the
    /// manual-resolution schema gate.
    schemas: HashMap<String, Vec<String>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new version of `path`.
    pub fn put(
        &mut self,
        path: &str,
        content: Value,
        derived_from: Vec<ArtifactId>,
    ) -> VersionedArtifact {
        self.put_by(path, content, derived_from, None)
    }

    /// Append a new version, recording the producing agent.
    pub fn put_by(
        &mut self,
        path: &str,
        content: Value,
        derived_from: Vec<ArtifactId>,
        produced_by: Option<&str>,
    ) -> VersionedArtifact {
        self.put_from(path, content, derived_from, None, produced_by)
    }

    /// Append a new version whose parent is `base` rather than the chain
    /// tip. This is how a concurrent write is recorded: two producers that
    /// both read version N each put with `base = N`, creating sibling
    /// versions neither of which descends from the other.
    pub fn put_from(
        &mut self,
        path: &str,
        content: Value,
        derived_from: Vec<ArtifactId>,
        base: Option<&str>,
        produced_by: Option<&str>,
    ) -> VersionedArtifact {
        let chain = self.by_path.entry(path.to_string()).or_default();
        let version = chain.len() as u32 + 1;
        let previous_version = base
            .map(str::to_string)
            .or_else(|| chain.last().cloned());

        let validation_status = match self.schemas.get(path) {
            Some(required) => match check_required_keys(required, &content) {
                Ok(()) => ValidationStatus::Valid,
                Err(_) => ValidationStatus::Invalid,
            },
            None => ValidationStatus::Unknown,
        };

        let size_bytes = serde_json::to_vec(&content).map(|v| v.len()).unwrap_or(0);
        let artifact = VersionedArtifact {
            id: Uuid::new_v4().to_string(),
            path: path.to_string(),
            version,
            hash: content_hash(&content),
            size_bytes,
            content,
            derived_from,
            previous_version,
            validation_status,
            critical: self.critical_paths.contains(path),
            produced_by: produced_by.map(str::to_string),
            created_at: Utc::now(),
        };

        chain.push(artifact.id.clone());
        self.by_id.insert(artifact.id.clone(), artifact.clone());
        tracing::debug!(path, version, hash = %artifact.hash, "artifact version appended");
        artifact
    }

    pub fn get(&self, id: &str) -> Option<&VersionedArtifact> {
        self.by_id.get(id)
    }

    pub fn latest(&self, path: &str) -> Option<&VersionedArtifact> {
        self.by_path
            .get(path)
            .and_then(|chain| chain.last())
            .and_then(|id| self.by_id.get(id))
    }

    pub fn history(&self, path: &str) -> EngineResult<ArtifactHistory> {
        let chain = self
            .by_path
            .get(path)
            .ok_or_else(|| EngineError::UnknownArtifactPath(path.to_string()))?;
        let versions: Vec<VersionedArtifact> = chain
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect();
        Ok(ArtifactHistory {
            current_version: versions.last().map(|a| a.version).unwrap_or(0),
            total_versions: versions.len(),
            versions,
        })
    }

    /// Derivation tree view: `derived_from` followed backward (parents) and
    /// forward (children).
    pub fn lineage(&self, id: &str) -> EngineResult<Lineage> {
        let artifact = self
            .by_id
            .get(id)
            .ok_or_else(|| EngineError::ArtifactNotFound(id.to_string()))?
            .clone();
        let parents = artifact
            .derived_from
            .iter()
            .filter_map(|p| self.by_id.get(p).cloned())
            .collect();
        let mut children: Vec<VersionedArtifact> = self
            .by_id
            .values()
            .filter(|a| a.derived_from.iter().any(|d| d == id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(Lineage {
            artifact,
            parents,
            children,
        })
    }

    pub fn set_validation(&mut self, id: &str, status: ValidationStatus) -> EngineResult<()> {
        let artifact = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| EngineError::ArtifactNotFound(id.to_string()))?;
        artifact.validation_status = status;
        Ok(())
    }

    /// Flag a path as critical; applies to versions created afterwards.
    pub fn mark_critical(&mut self, path: &str) {
        self.critical_paths.insert(path.to_string());
    }

    /// Declare required top-level keys for a path. Subsequent `put` calls
    /// are validated against them.
    pub fn declare_schema(&mut self, path: &str, required_keys: Vec<String>) {
        self.schemas.insert(path.to_string(), required_keys);
    }

    pub fn validate_against_schema(&self, path: &str, content: &Value) -> Result<(), String> {
        match self.schemas.get(path) {
            Some(required) => check_required_keys(required, content),
            None => Ok(()),
        }
    }

    /// The gate downstream nodes must respect: a critical artifact is only
    /// usable once its validation status is `Valid`.
    pub fn is_usable(&self, id: &str) -> bool {
        match self.by_id.get(id) {
            Some(a) => !a.critical || a.validation_status == ValidationStatus::Valid,
            None => false,
        }
    }

    /// Whether `descendant` has `ancestor` in its `previous_version` chain.
    pub fn is_descendant(&self, descendant: &str, ancestor: &str) -> bool {
        let mut cursor = self
            .by_id
            .get(descendant)
            .and_then(|a| a.previous_version.clone());
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.by_id.get(&id).and_then(|a| a.previous_version.clone());
        }
        false
    }

    /// Nearest common ancestor of two versions along `previous_version`,
    /// excluding the versions themselves.
    pub fn common_ancestor(&self, a: &str, b: &str) -> Option<&VersionedArtifact> {
        let mut seen = HashSet::new();
        let mut cursor = self.by_id.get(a).and_then(|x| x.previous_version.clone());
        while let Some(id) = cursor {
            cursor = self.by_id.get(&id).and_then(|x| x.previous_version.clone());
            seen.insert(id);
        }
        let mut cursor = self.by_id.get(b).and_then(|x| x.previous_version.clone());
        while let Some(id) = cursor {
            if seen.contains(&id) {
                return self.by_id.get(&id);
            }
            cursor = self.by_id.get(&id).and_then(|x| x.previous_version.clone());
        }
        None
    }
}

fn check_required_keys(required: &[String], content: &Value) -> Result<(), String> {
    let Some(obj) = content.as_object() else {
        return Err("content is not an object".to_string());
    };
    for key in required {
        if !obj.contains_key(key) {
            return Err(format!("missing required key '{}'", key));
        }
    }
    Ok(())
}
