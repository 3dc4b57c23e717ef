//! Engine-level error types.

use thiserror::Error;

use registry::{DeploymentStatus, RegistrationConflictError};
use store::StoreError;

/// A schema failed one of the structural checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("workflow '{workflow_id}': invalid schema at {field_path}: {reason}")]
pub struct SchemaValidationError {
    pub workflow_id: String,
    /// Location of the offending field, e.g. `steps[2].parameters[0].options`.
    pub field_path: String,
    pub reason: String,
}

impl SchemaValidationError {
    pub fn new(
        workflow_id: impl Into<String>,
        field_path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            field_path: field_path.into(),
            reason: reason.into(),
        }
    }
}

/// A validated schema could not be rendered into an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("workflow '{workflow_id}': cannot render {field_path}: {reason}")]
pub struct RenderError {
    pub workflow_id: String,
    pub field_path: String,
    pub reason: String,
}

impl RenderError {
    pub fn new(
        workflow_id: impl Into<String>,
        field_path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            field_path: field_path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced by the workflow manager.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Schema / rendering ------

    /// Nothing was written.
    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    /// Aborted before any artifact was staged.
    #[error(transparent)]
    Render(#[from] RenderError),

    // ------ Side effects ------

    /// Artifact IO failed; previously written artifacts are untouched.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Artifacts stay on disk and the workflow stays GENERATED.
    #[error(transparent)]
    RegistrationConflict(#[from] RegistrationConflictError),

    // ------ Lifecycle ------

    #[error("workflow '{workflow_id}' not found")]
    NotFound { workflow_id: String },

    #[error("workflow '{workflow_id}': cannot {operation} while {status}")]
    InvalidTransition {
        workflow_id: String,
        status: DeploymentStatus,
        operation: &'static str,
    },
}

impl EngineError {
    /// Workflow the failed operation was acting on.
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::SchemaValidation(e) => &e.workflow_id,
            Self::Render(e) => &e.workflow_id,
            Self::Store(e) => e.workflow_id(),
            Self::RegistrationConflict(e) => e.workflow_id(),
            Self::NotFound { workflow_id } | Self::InvalidTransition { workflow_id, .. } => {
                workflow_id
            }
        }
    }

    /// Field path of schema and render errors.
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Self::SchemaValidation(e) => Some(&e.field_path),
            Self::Render(e) => Some(&e.field_path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_message_names_id_and_path() {
        let err: EngineError =
            SchemaValidationError::new("report", "steps[1].parameters[0].options", "must not be empty")
                .into();
        assert_eq!(
            err.to_string(),
            "workflow 'report': invalid schema at steps[1].parameters[0].options: must not be empty"
        );
        assert_eq!(err.workflow_id(), "report");
        assert_eq!(err.field_path(), Some("steps[1].parameters[0].options"));
    }

    #[test]
    fn invalid_transition_message() {
        let err = EngineError::InvalidTransition {
            workflow_id: "demo".into(),
            status: DeploymentStatus::Draft,
            operation: "generate",
        };
        assert_eq!(err.to_string(), "workflow 'demo': cannot generate while DRAFT");
        assert_eq!(err.field_path(), None);
    }
}
