//! Registration error type.

use plugins::{HttpMethod, PluginError};
use thiserror::Error;

/// Why a deployment could not be registered.
///
/// Whatever the variant, the live registries are left exactly as they were.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationConflictError {
    /// A route in the plugin's table is already served by another workflow.
    #[error("workflow '{workflow_id}': route {method} {path} is already owned by '{owner}'")]
    Route {
        workflow_id: String,
        method: HttpMethod,
        path: String,
        owner: String,
    },

    /// The UI component identity is already registered by another workflow.
    #[error("workflow '{workflow_id}': UI component '{component}' is already owned by '{owner}'")]
    Component {
        workflow_id: String,
        component: String,
        owner: String,
    },

    /// The plugin describes a different workflow than the one being registered.
    #[error("workflow '{workflow_id}': plugin reports id '{plugin_id}'")]
    OwnerMismatch {
        workflow_id: String,
        plugin_id: String,
    },

    /// The plugin's own route table collides with itself.
    #[error("workflow '{workflow_id}': invalid route table: {source}")]
    InvalidRouteTable {
        workflow_id: String,
        #[source]
        source: PluginError,
    },
}

impl RegistrationConflictError {
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::Route { workflow_id, .. }
            | Self::Component { workflow_id, .. }
            | Self::OwnerMismatch { workflow_id, .. }
            | Self::InvalidRouteTable { workflow_id, .. } => workflow_id,
        }
    }
}
