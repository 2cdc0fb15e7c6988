//! Conflict-resolution error types.

use thiserror::Error;

/// Errors from the conflict detector and resolver. A rejected resolution
/// leaves the conflict unresolved; the caller may retry with a different
/// strategy.
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("Conflict not found: {0}")]
    NotFound(String),
    #[error("Conflict already resolved: {0}")]
    AlreadyResolved(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Manual content failed schema validation: {0}")]
    SchemaViolation(String),
    #[error("Unknown producing agent in priority ranking: {0}")]
    UnknownAgent(String),
}
