// Shared storage for intermediate tables passed between pipeline stages

pub mod artifact_store;

pub use artifact_store::{ArtifactRef, ArtifactStore};
