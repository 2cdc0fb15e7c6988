//! Conflict model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::ArtifactId;

/// What kind of divergence was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    /// Two versions of the same path, neither a descendant of the other.
    ConcurrentWrite,
    /// The two sides disagree on content shape (object vs. opaque).
    SchemaConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionKind {
    Field,
    WholeContent,
}

/// One conflicting region of the artifact content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRegion {
    pub kind: RegionKind,
    /// Field name for `field` regions, the path itself for whole-content.
    pub location: String,
    pub current: Value,
    pub incoming: Value,
    pub base: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    AutoMerge,
    LastWriteWins,
    FirstWriteWins,
    MergeBoth,
    Manual,
    AgentPriority,
}

/// Recorded outcome of a resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    pub result: Value,
    pub resolved_by: String,
    pub timestamp: DateTime<Utc>,
    /// Audit trail, e.g. regions where auto-merge fell back to
    /// last-write-wins.
    pub notes: Vec<String>,
}

/// A detected divergence between two versions of one artifact path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConflict {
    pub id: String,
    pub artifact_path: String,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub current_version: ArtifactId,
    pub incoming_version: ArtifactId,
    pub regions: Vec<ConflictRegion>,
    pub resolution: Option<Resolution>,
}

impl ArtifactConflict {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
