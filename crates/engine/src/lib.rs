//! `engine` crate: workflow schemas, step inference, artifact rendering and
//! the lifecycle manager that ties them to the store and the registrar.

pub mod models;
pub mod error;
pub mod validate;
pub mod infer;
pub mod render;
pub mod plugin;
pub mod config;
pub mod samples;
pub mod manager;

pub use models::{
    slugify, LlmConfig, Parameter, ParameterType, ResponseFormat, Step, StepType, ValidationRule,
    VisibilityCondition, VisibleWhen, WorkflowSchema,
};
pub use error::{EngineError, RenderError, SchemaValidationError};
pub use validate::validate_schema;
pub use infer::{infer, step_from_task, Confidence, Inference, RULE_TABLE_VERSION};
pub use render::TemplateRenderer;
pub use plugin::GeneratedPlugin;
pub use config::GeneratorConfig;
pub use samples::{SampleWorkflow, SAMPLE_WORKFLOWS};
pub use manager::{Creation, Generation, WorkflowManager};

#[cfg(test)]
mod manager_tests;
