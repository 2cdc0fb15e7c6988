//! Conflict detection and resolution across concurrently-produced artifact
//! versions.

mod detector;
mod resolver;
mod types;

pub use detector::detect;
pub use resolver::{ConflictRegistry, ResolutionPolicy, ResolutionRequest};
pub use types::{
    ArtifactConflict, ConflictRegion, ConflictSeverity, ConflictType, RegionKind, Resolution,
    ResolutionStrategy,
};
