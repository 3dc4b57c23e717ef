//! All-or-nothing artifact writes.
//!
//! A write goes through three phases:
//! 1. Stage: each artifact is written and fsynced to a temporary file in the
//!    directory of its target, so the later rename never crosses filesystems.
//! 2. Promote: once all four are staged, each temp file is renamed over its
//!    target.
//! 3. Roll back: if a promotion fails, targets already promoted are restored
//!    to their previous content (or removed when they did not exist before).
//!
//! A failure in phase 1 leaves every target untouched; staged temp files are
//! deleted when dropped.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{ArtifactKind, ArtifactLayout, ChecksumSet, GenerationArtifact, StoreError};

/// Prefix of staging files; never matches a target file name.
const STAGING_PREFIX: &str = ".staging-";

/// Filesystem-backed artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
}

/// A staged artifact waiting to be promoted.
struct Staged<'a> {
    artifact: &'a GenerationArtifact,
    file: NamedTempFile,
}

impl ArtifactStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Write all four artifacts of `workflow_id` as one unit.
    ///
    /// Returns the checksum set of what is now on disk.
    ///
    /// # Errors
    /// - [`StoreError::IncompleteArtifactSet`] / [`StoreError::UnexpectedTarget`]
    ///   if `artifacts` is not exactly one artifact per kind at the layout's paths.
    /// - [`StoreError::Stage`] if any artifact could not be staged (no target touched).
    /// - [`StoreError::Promote`] if a promotion failed (earlier ones rolled back).
    pub fn write(
        &self,
        workflow_id: &str,
        artifacts: &[GenerationArtifact],
    ) -> Result<ChecksumSet, StoreError> {
        let ordered = self.check_artifact_set(workflow_id, artifacts)?;

        // -------------------------------------------------------------------
        // 1. Stage
        // -------------------------------------------------------------------
        let mut created_dirs: Vec<PathBuf> = Vec::new();
        let mut staged: Vec<Staged<'_>> = Vec::with_capacity(ordered.len());

        for artifact in ordered {
            match stage(artifact, &mut created_dirs) {
                Ok(file) => staged.push(Staged { artifact, file }),
                Err((path, source)) => {
                    drop(staged);
                    remove_empty_dirs(&created_dirs);
                    warn!(
                        "workflow '{}': staging {} failed, no artifact written",
                        workflow_id, artifact.kind
                    );
                    return Err(StoreError::Stage {
                        workflow_id: workflow_id.to_owned(),
                        path,
                        source,
                    });
                }
            }
        }
        debug!("workflow '{}': staged {} artifacts", workflow_id, staged.len());

        // -------------------------------------------------------------------
        // 2. Promote
        // -------------------------------------------------------------------
        let mut promoted: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());

        for Staged { artifact, file } in staged {
            let target = artifact.path.clone();
            let outcome = read_previous(&target).and_then(|previous| {
                file.persist(&target)
                    .map(|_| previous)
                    .map_err(|e| e.error)
            });

            match outcome {
                Ok(previous) => promoted.push((target, previous)),
                Err(source) => {
                    // 3. Roll back
                    rollback(workflow_id, &promoted);
                    return Err(StoreError::Promote {
                        workflow_id: workflow_id.to_owned(),
                        path: target,
                        source,
                    });
                }
            }
        }

        info!("workflow '{}': promoted {} artifacts", workflow_id, promoted.len());
        Ok(ChecksumSet::from_artifacts(artifacts))
    }

    /// True when every artifact on disk matches `checksums`.
    pub fn verify(&self, workflow_id: &str, checksums: &ChecksumSet) -> bool {
        if !checksums.is_complete() {
            return false;
        }
        checksums.iter().all(|(kind, expected)| {
            let path = self.layout.target_path(workflow_id, kind);
            match fs::read_to_string(&path) {
                Ok(content) => crate::content_checksum(&content) == expected,
                Err(_) => false,
            }
        })
    }

    /// Checksums of whatever artifacts currently exist on disk for `workflow_id`.
    pub fn checksums_on_disk(&self, workflow_id: &str) -> Result<ChecksumSet, StoreError> {
        let mut set = ChecksumSet::default();
        for kind in ArtifactKind::ALL {
            let path = self.layout.target_path(workflow_id, kind);
            match fs::read_to_string(&path) {
                Ok(content) => set.insert(kind, crate::content_checksum(&content)),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Io {
                        workflow_id: workflow_id.to_owned(),
                        path,
                        source,
                    })
                }
            }
        }
        Ok(set)
    }

    /// Read the serialized schema descriptor of `workflow_id`.
    pub fn read_schema_descriptor(&self, workflow_id: &str) -> Result<String, StoreError> {
        let path = self
            .layout
            .target_path(workflow_id, ArtifactKind::SchemaDescriptor);
        fs::read_to_string(&path).map_err(|source| StoreError::Io {
            workflow_id: workflow_id.to_owned(),
            path,
            source,
        })
    }

    /// Ids of every workflow with a schema descriptor under `apps_dir`, sorted.
    pub fn list_workflow_ids(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.layout.apps_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    workflow_id: String::new(),
                    path: self.layout.apps_dir.clone(),
                    source,
                })
            }
        };

        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join("schema.json").is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Delete every artifact of `workflow_id`. Missing files are ignored.
    pub fn remove(&self, workflow_id: &str) -> Result<(), StoreError> {
        for kind in ArtifactKind::ALL {
            let path = self.layout.target_path(workflow_id, kind);
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Io {
                        workflow_id: workflow_id.to_owned(),
                        path,
                        source,
                    })
                }
            }
        }
        remove_empty_dirs(&[self.layout.app_dir(workflow_id)]);
        info!("workflow '{}': artifacts removed", workflow_id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal: make sure the set is exactly one artifact per kind, in
    // staging order, each at its layout path.
    // -----------------------------------------------------------------------

    fn check_artifact_set<'a>(
        &self,
        workflow_id: &str,
        artifacts: &'a [GenerationArtifact],
    ) -> Result<Vec<&'a GenerationArtifact>, StoreError> {
        let incomplete = || StoreError::IncompleteArtifactSet {
            workflow_id: workflow_id.to_owned(),
            expected: ArtifactKind::ALL.len(),
            actual: artifacts.len(),
        };

        if artifacts.len() != ArtifactKind::ALL.len() {
            return Err(incomplete());
        }

        let mut ordered = Vec::with_capacity(ArtifactKind::ALL.len());
        for kind in ArtifactKind::ALL {
            let artifact = artifacts
                .iter()
                .find(|a| a.kind == kind)
                .ok_or_else(incomplete)?;

            let expected = self.layout.target_path(workflow_id, kind);
            if artifact.path != expected {
                return Err(StoreError::UnexpectedTarget {
                    workflow_id: workflow_id.to_owned(),
                    kind,
                    expected,
                    actual: artifact.path.clone(),
                });
            }
            ordered.push(artifact);
        }
        Ok(ordered)
    }
}

/// Write `artifact` to a temp file beside its target.
fn stage(
    artifact: &GenerationArtifact,
    created_dirs: &mut Vec<PathBuf>,
) -> Result<NamedTempFile, (PathBuf, std::io::Error)> {
    let parent = artifact
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    ensure_dir(&parent, created_dirs).map_err(|e| (parent.clone(), e))?;

    let mut file = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(&parent)
        .map_err(|e| (parent.clone(), e))?;

    file.write_all(artifact.content.as_bytes())
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| (artifact.path.clone(), e))?;

    Ok(file)
}

/// `create_dir_all` that remembers which directories it had to create.
fn ensure_dir(dir: &Path, created_dirs: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut missing: Vec<PathBuf> = dir
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .map(Path::to_path_buf)
        .collect();
    fs::create_dir_all(dir)?;
    // Deepest first, so cleanup can remove them in order.
    created_dirs.append(&mut missing);
    Ok(())
}

/// Remove each directory if it exists and is empty.
fn remove_empty_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        let is_empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            let _ = fs::remove_dir(dir);
        }
    }
}

fn read_previous(target: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(target) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Put promoted targets back the way they were, newest first.
fn rollback(workflow_id: &str, promoted: &[(PathBuf, Option<Vec<u8>>)]) {
    for (path, previous) in promoted.iter().rev() {
        let restored = match previous {
            Some(bytes) => restore_bytes(path, bytes),
            None => fs::remove_file(path),
        };
        match restored {
            Ok(()) => debug!("workflow '{}': rolled back {}", workflow_id, path.display()),
            Err(e) => warn!(
                "workflow '{}': rollback of {} failed: {}",
                workflow_id,
                path.display(),
                e
            ),
        }
    }
}

fn restore_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(parent)?;
    file.write_all(bytes)?;
    file.persist(path).map(|_| ()).map_err(|e| e.error)
}
