//! The deployment registrar.
//!
//! Holds three maps behind one mutex:
//! - the live route table: `(method, path)` → owning workflow + handler,
//! - the live UI registry: component name → owning workflow,
//! - the deployments themselves, so unregistering can undo exactly what
//!   registering did.
//!
//! Locking discipline: every public method takes the lock once, does all of
//! its checks and mutations under it, and releases it before returning.
//! Nothing calls back into plugin code while the lock is held.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use plugins::{check_route_table, HttpMethod, PluginCapabilities, RouteKey, RouteSpec, UiEntry};
use store::ChecksumSet;

use crate::{DeploymentRecord, DeploymentStatus, RegistrationConflictError};

/// What `register` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The workflow was not registered before.
    Registered,
    /// The workflow was already registered with the same routes, UI entry
    /// and checksums; nothing changed.
    Unchanged,
    /// The previous registration of the same workflow was swapped out.
    Replaced,
}

#[derive(Debug, Clone)]
struct RouteOwner {
    workflow_id: String,
    handler: String,
}

#[derive(Debug, Clone)]
struct Registration {
    routes: Vec<RouteSpec>,
    ui: UiEntry,
    checksums: ChecksumSet,
    registered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Registries {
    routes: BTreeMap<RouteKey, RouteOwner>,
    components: BTreeMap<String, String>,
    deployments: BTreeMap<String, Registration>,
}

impl Registries {
    fn detach(&mut self, workflow_id: &str) -> Option<Registration> {
        let previous = self.deployments.remove(workflow_id)?;
        for route in &previous.routes {
            self.routes.remove(&route.key());
        }
        self.components.remove(&previous.ui.component);
        Some(previous)
    }

    fn attach(&mut self, workflow_id: &str, registration: Registration) {
        for route in &registration.routes {
            self.routes.insert(
                route.key(),
                RouteOwner {
                    workflow_id: workflow_id.to_owned(),
                    handler: route.handler.clone(),
                },
            );
        }
        self.components
            .insert(registration.ui.component.clone(), workflow_id.to_owned());
        self.deployments.insert(workflow_id.to_owned(), registration);
    }
}

/// Live registries of deployed workflows.
///
/// Create one per host process with [`DeploymentRegistrar::new`] and share it
/// behind an `Arc`; [`DeploymentRegistrar::clear`] empties it on shutdown.
#[derive(Debug, Default)]
pub struct DeploymentRegistrar {
    inner: Mutex<Registries>,
}

impl DeploymentRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registries> {
        // Mutations never panic half-way, so a poisoned lock still guards
        // consistent maps.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `plugin`'s routes and `ui` under `workflow_id`.
    ///
    /// # Errors
    /// Returns [`RegistrationConflictError`] if the plugin describes another
    /// workflow, its route table is inconsistent, or any route / the UI
    /// component is owned by a different workflow. On error the registries
    /// are unchanged.
    pub fn register(
        &self,
        workflow_id: &str,
        plugin: &dyn PluginCapabilities,
        ui: &UiEntry,
        checksums: &ChecksumSet,
    ) -> Result<RegisterOutcome, RegistrationConflictError> {
        if plugin.plugin_id() != workflow_id {
            return Err(RegistrationConflictError::OwnerMismatch {
                workflow_id: workflow_id.to_owned(),
                plugin_id: plugin.plugin_id().to_owned(),
            });
        }
        check_route_table(plugin).map_err(|source| RegistrationConflictError::InvalidRouteTable {
            workflow_id: workflow_id.to_owned(),
            source,
        })?;

        let mut routes = plugin.routes();
        routes.sort();

        let mut registries = self.lock();

        // -------------------------------------------------------------------
        // Same workflow, same surface: nothing to do.
        // -------------------------------------------------------------------
        if let Some(existing) = registries.deployments.get_mut(workflow_id) {
            if existing.routes == routes && existing.ui == *ui {
                if existing.checksums == *checksums {
                    debug!("workflow '{}' already registered, unchanged", workflow_id);
                    return Ok(RegisterOutcome::Unchanged);
                }
                existing.checksums = checksums.clone();
                info!("workflow '{}' re-registered with new checksums", workflow_id);
                return Ok(RegisterOutcome::Replaced);
            }
        }

        // -------------------------------------------------------------------
        // Collision check against every other owner.
        // -------------------------------------------------------------------
        for route in &routes {
            if let Some(owner) = registries.routes.get(&route.key()) {
                if owner.workflow_id != workflow_id {
                    warn!(
                        "workflow '{}': route {} {} already owned by '{}'",
                        workflow_id, route.method, route.path, owner.workflow_id
                    );
                    return Err(RegistrationConflictError::Route {
                        workflow_id: workflow_id.to_owned(),
                        method: route.method,
                        path: route.path.clone(),
                        owner: owner.workflow_id.clone(),
                    });
                }
            }
        }
        if let Some(owner) = registries.components.get(&ui.component) {
            if owner != workflow_id {
                warn!(
                    "workflow '{}': UI component '{}' already owned by '{}'",
                    workflow_id, ui.component, owner
                );
                return Err(RegistrationConflictError::Component {
                    workflow_id: workflow_id.to_owned(),
                    component: ui.component.clone(),
                    owner: owner.clone(),
                });
            }
        }

        // -------------------------------------------------------------------
        // Swap in the new registration.
        // -------------------------------------------------------------------
        let replaced = registries.detach(workflow_id).is_some();
        let route_count = routes.len();
        registries.attach(
            workflow_id,
            Registration {
                routes,
                ui: ui.clone(),
                checksums: checksums.clone(),
                registered_at: Utc::now(),
            },
        );

        info!(
            "workflow '{}' registered: {} routes, component '{}'",
            workflow_id, route_count, ui.component
        );
        Ok(if replaced {
            RegisterOutcome::Replaced
        } else {
            RegisterOutcome::Registered
        })
    }

    /// Remove everything registered under `workflow_id`.
    ///
    /// Returns `false` when nothing was registered (a no-op).
    pub fn unregister(&self, workflow_id: &str) -> bool {
        let removed = self.lock().detach(workflow_id).is_some();
        if removed {
            info!("workflow '{}' unregistered", workflow_id);
        }
        removed
    }

    /// Records of every registered workflow, ordered by id.
    pub fn list(&self) -> Vec<DeploymentRecord> {
        self.lock()
            .deployments
            .iter()
            .map(|(id, registration)| DeploymentRecord {
                workflow_id: id.clone(),
                checksums: registration.checksums.clone(),
                status: DeploymentStatus::Deployed,
                updated_at: registration.registered_at,
            })
            .collect()
    }

    pub fn is_registered(&self, workflow_id: &str) -> bool {
        self.lock().deployments.contains_key(workflow_id)
    }

    /// Routes registered for `workflow_id`, sorted.
    pub fn routes_for(&self, workflow_id: &str) -> Vec<RouteSpec> {
        self.lock()
            .deployments
            .get(workflow_id)
            .map(|r| r.routes.clone())
            .unwrap_or_default()
    }

    /// Owning workflow and handler of a live route.
    pub fn route_owner(&self, method: HttpMethod, path: &str) -> Option<(String, String)> {
        self.lock()
            .routes
            .get(&(method, path.to_owned()))
            .map(|owner| (owner.workflow_id.clone(), owner.handler.clone()))
    }

    /// Owning workflow of a live UI component.
    pub fn component_owner(&self, component: &str) -> Option<String> {
        self.lock().components.get(component).cloned()
    }

    /// Number of live routes across all workflows.
    pub fn route_count(&self) -> usize {
        self.lock().routes.len()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        let mut registries = self.lock();
        let count = registries.deployments.len();
        *registries = Registries::default();
        info!("registrar cleared ({} deployments)", count);
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use plugins::mock::MockPlugin;
    use store::ArtifactKind;

    fn plugin(id: &str, steps: usize) -> MockPlugin {
        (1..=steps).fold(MockPlugin::new(id), |p, n| {
            p.with_step(format!("/api/workflows/{id}/step_{n}"))
        })
    }

    fn ui(component: &str) -> UiEntry {
        UiEntry {
            component: component.into(),
            module: format!("./workflows/{component}"),
            title: component.into(),
        }
    }

    fn checksums(tag: &str) -> ChecksumSet {
        let mut set = ChecksumSet::default();
        for kind in ArtifactKind::ALL {
            set.insert(kind, format!("{tag}-{kind}"));
        }
        set
    }

    #[test]
    fn register_exposes_routes_and_component() {
        let registrar = DeploymentRegistrar::new();
        let outcome = registrar
            .register("demo", &plugin("demo", 2), &ui("DemoWorkflow"), &checksums("a"))
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Registered);
        assert_eq!(registrar.route_count(), 2);
        assert_eq!(
            registrar.route_owner(HttpMethod::Post, "/api/workflows/demo/step_2"),
            Some(("demo".to_string(), "step_2".to_string()))
        );
        assert_eq!(registrar.component_owner("DemoWorkflow"), Some("demo".into()));

        let records = registrar.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DeploymentStatus::Deployed);
        assert_eq!(records[0].checksums, checksums("a"));
    }

    #[test]
    fn registering_the_same_deployment_twice_is_a_no_op() {
        let registrar = DeploymentRegistrar::new();
        let p = plugin("demo", 2);
        registrar.register("demo", &p, &ui("DemoWorkflow"), &checksums("a")).unwrap();

        let again = registrar
            .register("demo", &p, &ui("DemoWorkflow"), &checksums("a"))
            .expect("re-registering the same surface must not conflict");

        assert_eq!(again, RegisterOutcome::Unchanged);
        assert_eq!(registrar.route_count(), 2);
    }

    #[test]
    fn route_owned_by_another_workflow_is_rejected_and_previous_kept() {
        let registrar = DeploymentRegistrar::new();
        registrar
            .register("first", &plugin("first", 1), &ui("FirstWorkflow"), &checksums("a"))
            .unwrap();

        let squatter = MockPlugin::new("second").with_step("/api/workflows/first/step_1");
        let err = registrar
            .register("second", &squatter, &ui("SecondWorkflow"), &checksums("b"))
            .unwrap_err();

        assert!(matches!(
            &err,
            RegistrationConflictError::Route { owner, .. } if owner == "first"
        ));
        assert_eq!(err.workflow_id(), "second");
        assert!(!registrar.is_registered("second"));
        assert_eq!(registrar.component_owner("SecondWorkflow"), None);
        assert_eq!(
            registrar.route_owner(HttpMethod::Post, "/api/workflows/first/step_1"),
            Some(("first".to_string(), "step_1".to_string()))
        );
    }

    #[test]
    fn component_owned_by_another_workflow_is_rejected() {
        let registrar = DeploymentRegistrar::new();
        registrar
            .register("first", &plugin("first", 1), &ui("SharedWorkflow"), &checksums("a"))
            .unwrap();

        let err = registrar
            .register("second", &plugin("second", 1), &ui("SharedWorkflow"), &checksums("b"))
            .unwrap_err();

        assert!(matches!(err, RegistrationConflictError::Component { .. }));
        assert_eq!(registrar.route_count(), 1);
    }

    #[test]
    fn plugin_for_another_workflow_is_rejected_before_reading_routes() {
        let registrar = DeploymentRegistrar::new();
        let other = plugin("other", 1);
        let err = registrar
            .register("demo", &other, &ui("DemoWorkflow"), &checksums("a"))
            .unwrap_err();
        assert!(matches!(err, RegistrationConflictError::OwnerMismatch { .. }));
        assert_eq!(other.route_reads(), 0);

        let demo = plugin("demo", 1);
        registrar.register("demo", &demo, &ui("DemoWorkflow"), &checksums("a")).unwrap();
        assert!(demo.route_reads() > 0);
    }

    #[test]
    fn changed_route_table_replaces_previous_registration() {
        let registrar = DeploymentRegistrar::new();
        registrar
            .register("demo", &plugin("demo", 3), &ui("DemoWorkflow"), &checksums("a"))
            .unwrap();

        let outcome = registrar
            .register("demo", &plugin("demo", 1), &ui("DemoWorkflow"), &checksums("b"))
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Replaced);
        assert_eq!(registrar.route_count(), 1);
        assert_eq!(
            registrar.route_owner(HttpMethod::Post, "/api/workflows/demo/step_3"),
            None
        );
    }

    #[test]
    fn unregister_is_exact_inverse_and_idempotent() {
        let registrar = DeploymentRegistrar::new();
        registrar
            .register("keep", &plugin("keep", 1), &ui("KeepWorkflow"), &checksums("a"))
            .unwrap();
        registrar
            .register("drop", &plugin("drop", 2), &ui("DropWorkflow"), &checksums("b"))
            .unwrap();

        assert!(registrar.unregister("drop"));
        assert!(!registrar.unregister("drop"));
        assert!(!registrar.unregister("never-registered"));

        assert_eq!(registrar.route_count(), 1);
        assert_eq!(registrar.component_owner("DropWorkflow"), None);
        assert!(registrar.is_registered("keep"));
        assert_eq!(registrar.routes_for("keep").len(), 1);
    }

    #[test]
    fn concurrent_registrations_of_distinct_ids_all_land() {
        let registrar = DeploymentRegistrar::new();
        let ids: Vec<String> = (0..8).map(|n| format!("wf_{n}")).collect();

        std::thread::scope(|scope| {
            for id in &ids {
                let registrar = &registrar;
                scope.spawn(move || {
                    let component = format!("{id}Workflow");
                    registrar
                        .register(id, &plugin(id, 2), &ui(&component), &checksums(id))
                        .unwrap();
                });
            }
        });

        assert_eq!(registrar.list().len(), ids.len());
        assert_eq!(registrar.route_count(), ids.len() * 2);
    }

    #[test]
    fn clear_empties_every_registry() {
        let registrar = DeploymentRegistrar::new();
        registrar
            .register("demo", &plugin("demo", 2), &ui("DemoWorkflow"), &checksums("a"))
            .unwrap();
        registrar.clear();
        assert!(registrar.list().is_empty());
        assert_eq!(registrar.route_count(), 0);
        assert_eq!(registrar.component_owner("DemoWorkflow"), None);
    }
}
