//! Workflow lifecycle manager.
//!
//! `WorkflowManager` is the only component callers talk to. It owns every
//! workflow schema and drives it through
//! `DRAFT → VALIDATED → GENERATED → DEPLOYED`:
//! 1. `create_*` builds a schema (inferring steps from tasks if needed).
//! 2. `validate` runs the schema checks.
//! 3. `generate` renders the four artifacts and writes them as one unit.
//! 4. `deploy` registers the plugin's routes and UI entry.
//! 5. `teardown` undoes whatever was done and frees the id.
//!
//! Each id has its own lock; operations on one id are serialized while
//! different ids proceed in parallel. A torn-down slot is marked under its
//! lock before it leaves the table, so a caller still holding it sees
//! `NotFound` instead of resurrecting the workflow.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use registry::{DeploymentRecord, DeploymentRegistrar, DeploymentStatus, RegisterOutcome};
use store::{ArtifactKind, ArtifactStore, ChecksumSet};

use crate::config::GeneratorConfig;
use crate::error::{EngineError, SchemaValidationError};
use crate::infer::{step_from_task, Inference};
use crate::models::{slugify, WorkflowSchema};
use crate::plugin::GeneratedPlugin;
use crate::render::descriptors::parse_schema_descriptor;
use crate::render::TemplateRenderer;
use crate::validate::validate_schema;

// ---------------------------------------------------------------------------
// Per-workflow slot
// ---------------------------------------------------------------------------

struct Slot {
    schema: WorkflowSchema,
    status: DeploymentStatus,
    checksums: ChecksumSet,
    updated_at: DateTime<Utc>,
}

impl Slot {
    fn new(schema: WorkflowSchema, status: DeploymentStatus, checksums: ChecksumSet) -> Self {
        Self {
            schema,
            status,
            checksums,
            updated_at: Utc::now(),
        }
    }

    fn transition(&mut self, status: DeploymentStatus) {
        debug!(
            "workflow '{}': {} -> {}",
            self.schema.id, self.status, status
        );
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn record(&self) -> DeploymentRecord {
        DeploymentRecord {
            workflow_id: self.schema.id.clone(),
            checksums: self.checksums.clone(),
            status: self.status,
            updated_at: self.updated_at,
        }
    }
}

type SlotHandle = Arc<Mutex<Slot>>;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of [`WorkflowManager::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub record: DeploymentRecord,
    /// False when the artifacts on disk already matched and nothing was written.
    pub changed: bool,
    /// Target paths of the four artifacts, in staging order.
    pub paths: Vec<PathBuf>,
}

/// Outcome of [`WorkflowManager::create_from_tasks`].
#[derive(Debug, Clone, PartialEq)]
pub struct Creation {
    pub record: DeploymentRecord,
    /// How each task became a step, in step order.
    pub inferences: Vec<Inference>,
}

// ---------------------------------------------------------------------------
// WorkflowManager
// ---------------------------------------------------------------------------

/// Orchestrates create → validate → generate → deploy → teardown.
///
/// Construct one manager per process with the registrar of the live system
/// it deploys into.
pub struct WorkflowManager {
    config: GeneratorConfig,
    renderer: TemplateRenderer,
    store: ArtifactStore,
    registrar: Arc<DeploymentRegistrar>,
    workflows: DashMap<String, SlotHandle>,
}

impl WorkflowManager {
    pub fn new(config: GeneratorConfig, registrar: Arc<DeploymentRegistrar>) -> Self {
        Self {
            renderer: TemplateRenderer::new(&config.route_prefix),
            store: ArtifactStore::new(config.layout()),
            config,
            registrar,
            workflows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn registrar(&self) -> &Arc<DeploymentRegistrar> {
        &self.registrar
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Create a DRAFT workflow whose steps are inferred from `tasks`.
    ///
    /// `category` falls back to the configured default.
    pub fn create_from_tasks<S: AsRef<str>>(
        &self,
        name: &str,
        description: &str,
        category: Option<&str>,
        tasks: &[S],
    ) -> Result<Creation, EngineError> {
        let (steps, inferences): (Vec<_>, Vec<_>) = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| step_from_task(i as u32 + 1, task.as_ref()))
            .unzip();
        let category = category.unwrap_or(&self.config.default_category);
        let record =
            self.create_from_schema(WorkflowSchema::new(name, description, category, steps))?;
        Ok(Creation { record, inferences })
    }

    /// Create a DRAFT workflow from an explicit schema.
    ///
    /// # Errors
    /// [`EngineError::SchemaValidation`] when the id is empty or already
    /// known; the full checks run in [`WorkflowManager::validate`].
    #[instrument(skip(self, schema), fields(workflow_id = %schema.id))]
    pub fn create_from_schema(
        &self,
        schema: WorkflowSchema,
    ) -> Result<DeploymentRecord, EngineError> {
        if schema.id.is_empty() {
            return Err(SchemaValidationError::new(
                "",
                "id",
                format!("name '{}' does not produce a usable id", schema.name),
            )
            .into());
        }

        match self.workflows.entry(schema.id.clone()) {
            Entry::Occupied(_) => {
                warn!("workflow '{}' already exists", schema.id);
                Err(SchemaValidationError::new(
                    &schema.id,
                    "id",
                    format!("'{}' is already in use", schema.id),
                )
                .into())
            }
            Entry::Vacant(vacant) => {
                let slot = Slot::new(schema, DeploymentStatus::Draft, ChecksumSet::default());
                let record = slot.record();
                vacant.insert(Arc::new(Mutex::new(slot)));
                info!("workflow '{}' created", record.workflow_id);
                Ok(record)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Validate / update
    // -----------------------------------------------------------------------

    /// Run the schema checks; DRAFT becomes VALIDATED.
    #[instrument(skip(self))]
    pub fn validate(&self, workflow_id: &str) -> Result<DeploymentRecord, EngineError> {
        let handle = self.handle(workflow_id)?;
        let mut slot = lock(&handle, workflow_id)?;

        if let Err(err) = validate_schema(&slot.schema, &self.other_ids(workflow_id)) {
            warn!("validation failed: {}", err);
            return Err(err.into());
        }
        if slot.status == DeploymentStatus::Draft {
            slot.transition(DeploymentStatus::Validated);
        }
        Ok(slot.record())
    }

    /// Replace the schema of an existing workflow, validating it first.
    ///
    /// A DRAFT workflow becomes VALIDATED. Generated and deployed workflows
    /// keep their status until the next `generate` picks up the change.
    #[instrument(skip(self, schema))]
    pub fn update_schema(
        &self,
        workflow_id: &str,
        schema: WorkflowSchema,
    ) -> Result<DeploymentRecord, EngineError> {
        if schema.id != workflow_id {
            return Err(SchemaValidationError::new(
                workflow_id,
                "id",
                format!("cannot change id to '{}'", schema.id),
            )
            .into());
        }

        let handle = self.handle(workflow_id)?;
        let mut slot = lock(&handle, workflow_id)?;

        validate_schema(&schema, &self.other_ids(workflow_id))?;
        if slot.schema == schema {
            debug!("schema unchanged");
        } else {
            slot.schema = schema;
            slot.updated_at = Utc::now();
            info!("schema updated");
        }
        if slot.status == DeploymentStatus::Draft {
            slot.transition(DeploymentStatus::Validated);
        }
        Ok(slot.record())
    }

    // -----------------------------------------------------------------------
    // Generate
    // -----------------------------------------------------------------------

    /// Render and write the four artifacts.
    ///
    /// A no-op when the schema renders to the checksums already recorded and
    /// the files on disk still match them. If the artifacts change while
    /// DEPLOYED, the stale registration is removed and the workflow drops
    /// back to GENERATED until it is deployed again.
    #[instrument(skip(self))]
    pub fn generate(&self, workflow_id: &str) -> Result<Generation, EngineError> {
        let handle = self.handle(workflow_id)?;
        let mut slot = lock(&handle, workflow_id)?;

        if slot.status == DeploymentStatus::Draft {
            return Err(EngineError::InvalidTransition {
                workflow_id: workflow_id.to_owned(),
                status: slot.status,
                operation: "generate",
            });
        }

        let artifacts = self.renderer.render_all(&slot.schema, self.store.layout())?;
        let rendered = ChecksumSet::from_artifacts(&artifacts);
        let paths: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();

        let already_written = matches!(
            slot.status,
            DeploymentStatus::Generated | DeploymentStatus::Deployed
        );
        if already_written
            && rendered == slot.checksums
            && self.store.verify(workflow_id, &rendered)
        {
            info!("artifacts unchanged, nothing to write");
            return Ok(Generation {
                record: slot.record(),
                changed: false,
                paths,
            });
        }

        let written = self.store.write(workflow_id, &artifacts)?;

        if slot.status == DeploymentStatus::Deployed && written != slot.checksums {
            self.registrar.unregister(workflow_id);
            warn!("artifacts changed while deployed; registration removed until redeploy");
            slot.transition(DeploymentStatus::Generated);
        } else if slot.status == DeploymentStatus::Validated {
            slot.transition(DeploymentStatus::Generated);
        }
        slot.checksums = written;
        slot.updated_at = Utc::now();

        info!("{} artifacts written", paths.len());
        Ok(Generation {
            record: slot.record(),
            changed: true,
            paths,
        })
    }

    // -----------------------------------------------------------------------
    // Deploy / teardown
    // -----------------------------------------------------------------------

    /// Register the generated plugin with the live system.
    ///
    /// Deploying an already deployed workflow is a no-op.
    ///
    /// # Errors
    /// [`EngineError::RegistrationConflict`] if a route or the UI component is
    /// owned by another workflow; the workflow stays GENERATED.
    #[instrument(skip(self))]
    pub fn deploy(&self, workflow_id: &str) -> Result<DeploymentRecord, EngineError> {
        let handle = self.handle(workflow_id)?;
        let mut slot = lock(&handle, workflow_id)?;

        if !matches!(
            slot.status,
            DeploymentStatus::Generated | DeploymentStatus::Deployed
        ) {
            return Err(EngineError::InvalidTransition {
                workflow_id: workflow_id.to_owned(),
                status: slot.status,
                operation: "deploy",
            });
        }

        let plugin = GeneratedPlugin::from_schema(&slot.schema, &self.renderer)?;
        let outcome = self
            .registrar
            .register(workflow_id, &plugin, plugin.ui_entry(), &slot.checksums)
            .map_err(|err| {
                warn!("registration failed: {}", err);
                err
            })?;

        if outcome == RegisterOutcome::Unchanged {
            debug!("already registered");
        }
        if slot.status != DeploymentStatus::Deployed {
            slot.transition(DeploymentStatus::Deployed);
            info!("deployed");
        }
        Ok(slot.record())
    }

    /// Remove the artifacts and the registration, and forget the workflow.
    ///
    /// Allowed from any status. The returned record is TORN_DOWN. When an
    /// artifact cannot be removed the registration and the status are left
    /// as they were, and a later `generate` restores the missing files.
    #[instrument(skip(self))]
    pub fn teardown(&self, workflow_id: &str) -> Result<DeploymentRecord, EngineError> {
        let handle = self.handle(workflow_id)?;
        let mut slot = lock(&handle, workflow_id)?;

        if let Err(err) = self.store.remove(workflow_id) {
            warn!("artifact removal failed, workflow stays {}: {}", slot.status, err);
            return Err(err.into());
        }
        if self.registrar.unregister(workflow_id) {
            debug!("registration removed");
        }

        slot.transition(DeploymentStatus::TornDown);
        slot.checksums = ChecksumSet::default();
        let record = slot.record();
        self.workflows
            .remove_if(workflow_id, |_, current| Arc::ptr_eq(current, &handle));

        info!("torn down");
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Records of every known workflow, ordered by id.
    pub fn list(&self) -> Vec<DeploymentRecord> {
        let handles: Vec<SlotHandle> = self
            .workflows
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut records: Vec<DeploymentRecord> = handles
            .iter()
            .map(|h| h.lock().unwrap_or_else(|p| p.into_inner()).record())
            .filter(|r| r.status != DeploymentStatus::TornDown)
            .collect();
        records.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));
        records
    }

    pub fn status(&self, workflow_id: &str) -> Result<DeploymentRecord, EngineError> {
        let handle = self.handle(workflow_id)?;
        let slot = lock(&handle, workflow_id)?;
        Ok(slot.record())
    }

    pub fn schema(&self, workflow_id: &str) -> Result<WorkflowSchema, EngineError> {
        let handle = self.handle(workflow_id)?;
        let slot = lock(&handle, workflow_id)?;
        Ok(slot.schema.clone())
    }

    /// Where the artifacts of `workflow_id` live (whether or not written yet).
    pub fn artifact_paths(&self, workflow_id: &str) -> Vec<PathBuf> {
        ArtifactKind::ALL
            .iter()
            .map(|&kind| self.store.layout().target_path(workflow_id, kind))
            .collect()
    }

    /// Python snippet for mounting the plugin into a host server by hand.
    pub fn integration_snippet(&self, workflow_id: &str) -> Result<String, EngineError> {
        let schema = self.schema(workflow_id)?;
        Ok(self.renderer.integration_snippet(&schema)?)
    }

    // -----------------------------------------------------------------------
    // Restore
    // -----------------------------------------------------------------------

    /// Load workflows whose schema descriptors are on disk but not in memory.
    ///
    /// Restored workflows are GENERATED, or DEPLOYED if the registrar already
    /// serves them. Unreadable descriptors are skipped with a warning.
    /// Returns the restored ids.
    #[instrument(skip(self))]
    pub fn restore(&self) -> Result<Vec<String>, EngineError> {
        let mut restored = Vec::new();

        for id in self.store.list_workflow_ids()? {
            if self.workflows.contains_key(&id) {
                continue;
            }
            let schema = match self
                .store
                .read_schema_descriptor(&id)
                .map_err(EngineError::from)
                .and_then(|text| {
                    parse_schema_descriptor(&text).map_err(|e| {
                        SchemaValidationError::new(&id, "schema.json", e.to_string()).into()
                    })
                }) {
                Ok(schema) => schema,
                Err(err) => {
                    warn!("skipping '{}': {}", id, err);
                    continue;
                }
            };
            if schema.id != id || slugify(&schema.name) != id {
                warn!("skipping '{}': descriptor describes '{}'", id, schema.id);
                continue;
            }
            let checksums = match self.store.checksums_on_disk(&id) {
                Ok(checksums) => checksums,
                Err(err) => {
                    warn!("skipping '{}': {}", id, err);
                    continue;
                }
            };
            let status = if self.registrar.is_registered(&id) {
                DeploymentStatus::Deployed
            } else {
                DeploymentStatus::Generated
            };

            if let Entry::Vacant(vacant) = self.workflows.entry(id.clone()) {
                vacant.insert(Arc::new(Mutex::new(Slot::new(schema, status, checksums))));
                debug!("restored '{}' as {}", id, status);
                restored.push(id);
            }
        }

        info!("restored {} workflows", restored.len());
        Ok(restored)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn handle(&self, workflow_id: &str) -> Result<SlotHandle, EngineError> {
        self.workflows
            .get(workflow_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| not_found(workflow_id))
    }

    fn other_ids(&self, workflow_id: &str) -> HashSet<String> {
        self.workflows
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| id != workflow_id)
            .collect()
    }
}

fn not_found(workflow_id: &str) -> EngineError {
    EngineError::NotFound {
        workflow_id: workflow_id.to_owned(),
    }
}

/// Lock a slot, treating a torn-down slot as absent.
fn lock<'a>(
    handle: &'a Mutex<Slot>,
    workflow_id: &str,
) -> Result<MutexGuard<'a, Slot>, EngineError> {
    // No operation leaves a slot half-updated across a panic point.
    let slot = handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.status == DeploymentStatus::TornDown {
        return Err(not_found(workflow_id));
    }
    Ok(slot)
}
