//! `store` crate: pure artifact persistence layer.
//!
//! Knows where each generated artifact lives on disk and how to put all four
//! of a workflow's artifacts in place as one unit. No rendering or lifecycle
//! logic lives here.

pub mod error;
pub mod models;
pub mod writer;

pub use error::StoreError;
pub use models::{content_checksum, ArtifactKind, ArtifactLayout, ChecksumSet, GenerationArtifact};
pub use writer::ArtifactStore;
