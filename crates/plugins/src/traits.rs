//! The `PluginCapabilities` trait: the contract every generated plugin fulfils.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PluginError;

/// HTTP verbs a plugin route may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get    => write!(f, "GET"),
            Self::Post   => write!(f, "POST"),
            Self::Put    => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Key under which a route is held in the live route registry.
pub type RouteKey = (HttpMethod, String);

/// One entry of a plugin's route table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Absolute URL path, e.g. `/api/workflows/hello_workflow/step_1`.
    pub path: String,
    pub method: HttpMethod,
    /// Name of the handler serving this route (see [`HandlerRef::name`]).
    pub handler: String,
}

impl RouteSpec {
    pub fn key(&self) -> RouteKey {
        (self.method, self.path.clone())
    }
}

/// What a step handler does, as tagged data.
///
/// Each variant carries the parameter names the handler reads, so the live
/// system can reason about a handler without loading generated source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerKind {
    /// Echoes the submitted form back as the step result.
    FormInput { fields: Vec<String> },
    /// Calls the AI provider selected by `provider_parameter`.
    LlmProcessing { provider_parameter: Option<String> },
    /// Consumes one or more uploaded files.
    FileProcessing { file_parameters: Vec<String> },
    /// Fetches the URL held in `url_parameter`.
    HttpRequest { url_parameter: Option<String> },
    CodeExecution,
    DataTransformation,
}

/// Reference to the handler serving one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRef {
    /// 1-based step index.
    pub step_index: u32,
    /// Handler identifier inside the generated plugin, e.g. `step_1`.
    pub name: String,
    pub kind: HandlerKind,
}

/// Identity of a generated UI component in the live UI registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiEntry {
    /// Exported component name, e.g. `HelloWorkflowWorkflow`.
    pub component: String,
    /// Module the component is imported from, relative to the frontend root.
    pub module: String,
    /// Human-readable title shown in navigation.
    pub title: String,
}

/// Capability set exposed by a backend plugin.
///
/// Implementors only describe themselves; registering the routes is the
/// registrar's job.
pub trait PluginCapabilities: Send + Sync {
    /// Identifier of the workflow the plugin was generated for.
    fn plugin_id(&self) -> &str;

    /// Routes the plugin wants registered in the live system.
    fn routes(&self) -> Vec<RouteSpec>;

    /// Handler serving the step at `step_index` (1-based), if any.
    fn handler(&self, step_index: u32) -> Option<HandlerRef>;

    /// All handlers in step order.
    fn handlers(&self) -> Vec<HandlerRef> {
        (1..)
            .map_while(|index| self.handler(index))
            .collect()
    }
}

/// Check that a plugin's route table is internally consistent.
///
/// # Errors
/// - [`PluginError::DuplicateRoute`] if a method + path pair repeats.
/// - [`PluginError::UnknownHandler`] if a route names a handler the plugin
///   does not expose.
pub fn check_route_table(plugin: &dyn PluginCapabilities) -> Result<(), PluginError> {
    let handler_names: HashSet<String> = plugin
        .handlers()
        .into_iter()
        .map(|h| h.name)
        .collect();

    let mut seen: HashSet<RouteKey> = HashSet::new();
    for route in plugin.routes() {
        if !handler_names.contains(&route.handler) {
            return Err(PluginError::UnknownHandler {
                plugin_id: plugin.plugin_id().to_owned(),
                path: route.path,
                handler: route.handler,
            });
        }
        if !seen.insert(route.key()) {
            return Err(PluginError::DuplicateRoute {
                plugin_id: plugin.plugin_id().to_owned(),
                method: route.method.to_string(),
                path: route.path,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlugin;

    #[test]
    fn handlers_are_collected_in_step_order() {
        let plugin = MockPlugin::new("demo")
            .with_step("/api/workflows/demo/step_1")
            .with_step("/api/workflows/demo/step_2");

        let names: Vec<String> = plugin.handlers().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["step_1", "step_2"]);
    }

    #[test]
    fn consistent_route_table_passes() {
        let plugin = MockPlugin::new("demo").with_step("/api/workflows/demo/step_1");
        assert!(check_route_table(&plugin).is_ok());
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let plugin = MockPlugin::new("demo")
            .with_step("/api/workflows/demo/same")
            .with_step("/api/workflows/demo/same");

        assert!(matches!(
            check_route_table(&plugin),
            Err(PluginError::DuplicateRoute { path, .. }) if path == "/api/workflows/demo/same"
        ));
    }

    #[test]
    fn route_to_missing_handler_is_rejected() {
        let plugin = MockPlugin::new("demo").with_route(RouteSpec {
            path: "/api/workflows/demo/ghost".into(),
            method: HttpMethod::Post,
            handler: "ghost".into(),
        });

        assert!(matches!(
            check_route_table(&plugin),
            Err(PluginError::UnknownHandler { handler, .. }) if handler == "ghost"
        ));
    }

    #[test]
    fn http_method_displays_uppercase() {
        assert_eq!(HttpMethod::Post.to_string(), "POST");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
