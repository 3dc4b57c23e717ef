//! Typed error type for the store crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::ArtifactKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workflow '{workflow_id}': expected one artifact of each of the {expected} kinds, got {actual}")]
    IncompleteArtifactSet {
        workflow_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("workflow '{workflow_id}': {kind} artifact targets {}, expected {}", .actual.display(), .expected.display())]
    UnexpectedTarget {
        workflow_id: String,
        kind: ArtifactKind,
        expected: PathBuf,
        actual: PathBuf,
    },

    /// Writing an artifact to its staging location failed; nothing was promoted.
    #[error("workflow '{workflow_id}': failed to stage {}: {source}", .path.display())]
    Stage {
        workflow_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Moving a staged artifact into place failed; earlier promotions were rolled back.
    #[error("workflow '{workflow_id}': failed to promote {}: {source}", .path.display())]
    Promote {
        workflow_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workflow '{workflow_id}': io error on {}: {source}", .path.display())]
    Io {
        workflow_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Workflow the failed operation was acting on.
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::IncompleteArtifactSet { workflow_id, .. }
            | Self::UnexpectedTarget { workflow_id, .. }
            | Self::Stage { workflow_id, .. }
            | Self::Promote { workflow_id, .. }
            | Self::Io { workflow_id, .. } => workflow_id,
        }
    }
}
