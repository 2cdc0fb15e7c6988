//! Engine-level error types.
//!
//! This enum is deliberately small: graph problems surface as validation
//! diagnostics and simulation aborts surface as a result status, so the
//! only hard errors left are store lookups and ancestry walks.

use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("Artifact path has no versions: {0}")]
    UnknownArtifactPath(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}
