//! Plugin-level error type.

use thiserror::Error;

/// Errors raised when a plugin's advertised route table is inconsistent.
///
/// The registrar checks the table before touching any live registry, so these
/// never leave a half-registered plugin behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// The same method + path pair appears twice in one route table.
    #[error("plugin '{plugin_id}' declares route {method} {path} more than once")]
    DuplicateRoute {
        plugin_id: String,
        method: String,
        path: String,
    },

    /// A route points at a handler the plugin does not expose.
    #[error("plugin '{plugin_id}' route {path} references unknown handler '{handler}'")]
    UnknownHandler {
        plugin_id: String,
        path: String,
        handler: String,
    },
}
