//! Content-addressed artifact version store.

mod version_store;

pub use version_store::{
    content_hash, ArtifactHistory, ArtifactId, ArtifactStore, Lineage, ValidationStatus,
    VersionedArtifact,
};
