//! Artifact kinds, target layout, and checksums.
//!
//! These are *persistence* models: they say what a generated file is and
//! where it goes. What goes inside it is decided by the engine's renderer.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// The four artifacts produced for every workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    BackendPlugin,
    FrontendComponent,
    ConfigDescriptor,
    SchemaDescriptor,
}

impl ArtifactKind {
    /// Every kind, in the order artifacts are staged and promoted.
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::BackendPlugin,
        ArtifactKind::FrontendComponent,
        ArtifactKind::ConfigDescriptor,
        ArtifactKind::SchemaDescriptor,
    ];
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendPlugin     => write!(f, "backend-plugin"),
            Self::FrontendComponent => write!(f, "frontend-component"),
            Self::ConfigDescriptor  => write!(f, "config-descriptor"),
            Self::SchemaDescriptor  => write!(f, "schema-descriptor"),
        }
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backend-plugin"     => Ok(Self::BackendPlugin),
            "frontend-component" => Ok(Self::FrontendComponent),
            "config-descriptor"  => Ok(Self::ConfigDescriptor),
            "schema-descriptor"  => Ok(Self::SchemaDescriptor),
            other                => Err(format!("unknown artifact kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ArtifactLayout
// ---------------------------------------------------------------------------

/// Directory layout the artifacts are written into.
///
/// ```text
/// {backend_dir}/{id}_plugin.py
/// {frontend_dir}/{id}_workflow.tsx
/// {apps_dir}/{id}/config.json
/// {apps_dir}/{id}/schema.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub backend_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub apps_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(
        backend_dir: impl Into<PathBuf>,
        frontend_dir: impl Into<PathBuf>,
        apps_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend_dir: backend_dir.into(),
            frontend_dir: frontend_dir.into(),
            apps_dir: apps_dir.into(),
        }
    }

    /// All three directories under a single root (handy for tests).
    pub fn rooted_at(root: &Path) -> Self {
        Self::new(root.join("backend"), root.join("frontend"), root.join("apps"))
    }

    /// Per-workflow directory holding the two descriptors.
    pub fn app_dir(&self, workflow_id: &str) -> PathBuf {
        self.apps_dir.join(workflow_id)
    }

    /// Where the artifact of `kind` for `workflow_id` lives.
    pub fn target_path(&self, workflow_id: &str, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::BackendPlugin => self.backend_dir.join(format!("{workflow_id}_plugin.py")),
            ArtifactKind::FrontendComponent => {
                self.frontend_dir.join(format!("{workflow_id}_workflow.tsx"))
            }
            ArtifactKind::ConfigDescriptor => self.app_dir(workflow_id).join("config.json"),
            ArtifactKind::SchemaDescriptor => self.app_dir(workflow_id).join("schema.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationArtifact
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 of `content`.
pub fn content_checksum(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{:x}", digest)
}

/// One rendered artifact, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub content: String,
    pub checksum: String,
}

impl GenerationArtifact {
    /// Build an artifact, computing its checksum from `content`.
    pub fn new(kind: ArtifactKind, path: impl Into<PathBuf>, content: String) -> Self {
        let checksum = content_checksum(&content);
        Self {
            kind,
            path: path.into(),
            content,
            checksum,
        }
    }
}

// ---------------------------------------------------------------------------
// ChecksumSet
// ---------------------------------------------------------------------------

/// Per-kind content checksums of one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSet(BTreeMap<ArtifactKind, String>);

impl ChecksumSet {
    pub fn from_artifacts(artifacts: &[GenerationArtifact]) -> Self {
        Self(
            artifacts
                .iter()
                .map(|a| (a.kind, a.checksum.clone()))
                .collect(),
        )
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        self.0.get(&kind).map(String::as_str)
    }

    pub fn insert(&mut self, kind: ArtifactKind, checksum: String) {
        self.0.insert(kind, checksum);
    }

    /// True when a checksum is present for every artifact kind.
    pub fn is_complete(&self) -> bool {
        ArtifactKind::ALL.iter().all(|k| self.0.contains_key(k))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}
