//! Error types for the engine.
//!
//! Recoverable problems — a bad condition, a malformed graph — surface as
//! data (diagnostics, simulation statuses), never as `Err`. The enums here
//! cover programmer-error-class inputs: looking up ids that do not exist,
//! or handing the conflict resolver content it must reject.

mod conflict_error;
mod engine_error;

pub use conflict_error::ConflictError;
pub use engine_error::EngineError;

/// Convenience alias used across the crate.
pub type EngineResult<T> = Result<T, EngineError>;
