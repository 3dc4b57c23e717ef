//! `MockPlugin`: a test double for `PluginCapabilities`.
//!
//! Useful in registrar tests where a hand-built route table is easier to
//! reason about than one derived from a full workflow schema.

use std::sync::{Arc, Mutex};

use crate::{HandlerKind, HandlerRef, HttpMethod, PluginCapabilities, RouteSpec};

/// A mock plugin with a programmer-specified route table that counts how
/// often its routes were read.
pub struct MockPlugin {
    /// Plugin (workflow) identifier.
    pub id: String,
    /// Handlers in step order.
    pub handlers: Vec<HandlerRef>,
    /// Route table returned by `routes()`.
    pub routes: Vec<RouteSpec>,
    /// Number of `routes()` calls seen so far.
    pub route_reads: Arc<Mutex<usize>>,
}

impl MockPlugin {
    /// Create a plugin with no routes and no handlers.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handlers: Vec::new(),
            routes: Vec::new(),
            route_reads: Arc::new(Mutex::new(0)),
        }
    }

    /// Append a step: a `step_{n}` handler plus a POST route at `path`.
    pub fn with_step(mut self, path: impl Into<String>) -> Self {
        let step_index = self.handlers.len() as u32 + 1;
        let name = format!("step_{step_index}");
        self.routes.push(RouteSpec {
            path: path.into(),
            method: HttpMethod::Post,
            handler: name.clone(),
        });
        self.handlers.push(HandlerRef {
            step_index,
            name,
            kind: HandlerKind::FormInput { fields: Vec::new() },
        });
        self
    }

    /// Append a raw route without adding a handler for it.
    pub fn with_route(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    /// Number of times the route table has been read.
    pub fn route_reads(&self) -> usize {
        *self.route_reads.lock().unwrap()
    }
}

impl PluginCapabilities for MockPlugin {
    fn plugin_id(&self) -> &str {
        &self.id
    }

    fn routes(&self) -> Vec<RouteSpec> {
        *self.route_reads.lock().unwrap() += 1;
        self.routes.clone()
    }

    fn handler(&self, step_index: u32) -> Option<HandlerRef> {
        self.handlers
            .iter()
            .find(|h| h.step_index == step_index)
            .cloned()
    }
}
