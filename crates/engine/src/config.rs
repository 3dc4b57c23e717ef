//! Generator configuration.
//!
//! Read from an optional TOML file and deserialized into
//! [`GeneratorConfig`]. Missing keys take their defaults; a missing or
//! malformed file falls back to [`GeneratorConfig::default()`] with a
//! warning. Callers apply command-line overrides on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use store::ArtifactLayout;

use crate::render::DEFAULT_ROUTE_PREFIX;

/// Category given to workflows created without one.
pub const DEFAULT_CATEGORY: &str = "auto_generated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Where backend plugins (`{id}_plugin.py`) are written.
    pub backend_dir: PathBuf,
    /// Where frontend components (`{id}_workflow.tsx`) are written.
    pub frontend_dir: PathBuf,
    /// Root of the per-workflow descriptor directories.
    pub apps_dir: PathBuf,
    pub default_category: String,
    /// Prefix of every generated route, e.g. `/api/workflows`.
    pub route_prefix: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend_dir: PathBuf::from("./backend"),
            frontend_dir: PathBuf::from("./frontend/src/components/workflows"),
            apps_dir: PathBuf::from("./apps"),
            default_category: DEFAULT_CATEGORY.to_owned(),
            route_prefix: DEFAULT_ROUTE_PREFIX.to_owned(),
        }
    }
}

impl GeneratorConfig {
    /// Defaults with all three output directories under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        let layout = ArtifactLayout::rooted_at(root);
        Self {
            backend_dir: layout.backend_dir,
            frontend_dir: layout.frontend_dir,
            apps_dir: layout.apps_dir,
            ..Self::default()
        }
    }

    /// Load from `path`, or return defaults when there is nothing usable.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(err) => {
                warn!("failed to read {}: {err}, using defaults", path.display());
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to parse {}: {err}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.backend_dir, &self.frontend_dir, &self.apps_dir)
    }
}
