//! Template rendering: schema in, artifact text out.
//!
//! Rendering is a pure function of the schema and the route prefix: the same
//! input always yields byte-identical text. All identifiers are derived once
//! in [`prepare`] so the backend, the frontend and the plugin descriptor
//! agree on every name.

pub mod backend;
pub mod code;
pub mod descriptors;
pub mod frontend;
pub mod ident;
pub mod snippet;
pub mod types;

use std::collections::HashMap;

use store::{ArtifactKind, ArtifactLayout, GenerationArtifact};

use crate::error::RenderError;
use crate::models::{Parameter, Step, VisibilityCondition, WorkflowSchema};

pub use ident::{pascal_case, quote, sanitize_identifier};
pub use types::{type_mapping, TypeMapping};

/// Route prefix used when none is configured.
pub const DEFAULT_ROUTE_PREFIX: &str = "/api/workflows";

// ---------------------------------------------------------------------------
// Prepared names
// ---------------------------------------------------------------------------

/// A resolved `visible_when` reference.
#[derive(Debug)]
pub struct PreparedVisibility<'a> {
    /// Frontend expression holding the referenced value, `step{index}Form.{ident}`.
    pub target: String,
    pub condition: &'a VisibilityCondition,
}

/// A parameter together with its sanitized identifier.
#[derive(Debug)]
pub struct PreparedField<'a> {
    pub param: &'a Parameter,
    pub ident: String,
    pub visibility: Option<PreparedVisibility<'a>>,
}

/// A step with every name the renderers need.
#[derive(Debug)]
pub struct PreparedStep<'a> {
    pub step: &'a Step,
    /// Backend handler and route segment, `step_{index}`.
    pub handler: String,
    /// Backend request model class, `Step{index}Request`.
    pub request_model: String,
    /// Frontend state variable, `step{index}Form`.
    pub form_var: String,
    pub fields: Vec<PreparedField<'a>>,
    /// Prompt template variables of an LLM step with the identifier each reads.
    pub prompt_vars: Vec<(&'a str, String)>,
}

impl<'a> PreparedStep<'a> {
    pub fn field(&self, name: &str) -> Option<&PreparedField<'a>> {
        self.fields.iter().find(|f| f.param.name == name)
    }

    pub fn form_setter(&self) -> String {
        format!("set{}", pascal_case(&self.form_var))
    }

    pub fn form_type(&self) -> String {
        format!("Step{}Form", self.step.index)
    }
}

/// The whole schema with derived names.
#[derive(Debug)]
pub struct PreparedWorkflow<'a> {
    pub schema: &'a WorkflowSchema,
    /// Sanitized id, usable as a Python/TypeScript identifier.
    pub module: String,
    /// `Pascal(id)`: prefix of the plugin class and the component.
    pub class_base: String,
    pub steps: Vec<PreparedStep<'a>>,
}

impl<'a> PreparedWorkflow<'a> {
    pub fn plugin_class(&self) -> String {
        format!("{}Plugin", self.class_base)
    }

    pub fn component(&self) -> String {
        format!("{}Workflow", self.class_base)
    }
}

/// Derive and check every generated identifier.
///
/// # Errors
/// [`RenderError`] when the id or a parameter name sanitizes to nothing,
/// when two parameter names of one step sanitize to the same identifier,
/// when a choice parameter has no options, or when a `visible_when` or a
/// prompt template variable names a parameter that cannot be resolved.
pub fn prepare(schema: &WorkflowSchema) -> Result<PreparedWorkflow<'_>, RenderError> {
    let module = sanitize_identifier(&schema.id).ok_or_else(|| {
        RenderError::new(&schema.id, "id", "does not yield a usable identifier")
    })?;

    let mut steps: Vec<PreparedStep<'_>> = Vec::with_capacity(schema.steps.len());
    for step in &schema.steps {
        let form_var = format!("step{}Form", step.index);
        let mut seen: HashMap<String, &str> = HashMap::new();
        let mut fields: Vec<PreparedField<'_>> = Vec::with_capacity(step.parameters.len());

        for (position, param) in step.parameters.iter().enumerate() {
            let at = format!("steps[{}].parameters[{}]", step.index, position);
            let path = format!("{at}.name");
            let ident = sanitize_identifier(&param.name).ok_or_else(|| {
                RenderError::new(
                    &schema.id,
                    &path,
                    format!("'{}' does not yield a usable identifier", param.name),
                )
            })?;
            if let Some(other) = seen.insert(ident.clone(), &param.name) {
                return Err(RenderError::new(
                    &schema.id,
                    &path,
                    format!(
                        "'{}' and '{}' both become identifier '{}'",
                        other, param.name, ident
                    ),
                ));
            }
            if param.param_type.is_choice() && param.options.is_empty() {
                return Err(RenderError::new(
                    &schema.id,
                    format!("{at}.options"),
                    format!("{} parameter '{}' has no options", param.param_type, param.name),
                ));
            }

            let visibility = match &param.visible_when {
                None => None,
                Some(rule) => {
                    // Same step: only parameters already prepared, i.e. earlier positions.
                    let target = match rule.step {
                        Some(index) if index != step.index => steps
                            .iter()
                            .find(|s| s.step.index == index)
                            .and_then(|s| {
                                s.field(&rule.parameter)
                                    .map(|f| format!("{}.{}", s.form_var, f.ident))
                            }),
                        _ => fields
                            .iter()
                            .find(|f| f.param.name == rule.parameter)
                            .map(|f| format!("{form_var}.{}", f.ident)),
                    };
                    let target = target.ok_or_else(|| {
                        RenderError::new(
                            &schema.id,
                            format!("{at}.visible_when"),
                            format!(
                                "parameter '{}' is not an earlier parameter of step {}",
                                rule.parameter,
                                rule.step.unwrap_or(step.index)
                            ),
                        )
                    })?;
                    Some(PreparedVisibility {
                        target,
                        condition: &rule.condition,
                    })
                }
            };

            fields.push(PreparedField {
                param,
                ident,
                visibility,
            });
        }

        let mut prompt_vars = Vec::new();
        if let Some(llm) = &step.llm_config {
            for (k, var) in llm.template_variables.iter().enumerate() {
                let field = fields.iter().find(|f| f.param.name == *var).ok_or_else(|| {
                    RenderError::new(
                        &schema.id,
                        format!("steps[{}].llm_config.template_variables[{}]", step.index, k),
                        format!("'{var}' is not a parameter of step {}", step.index),
                    )
                })?;
                prompt_vars.push((var.as_str(), field.ident.clone()));
            }
        }

        steps.push(PreparedStep {
            step,
            handler: format!("step_{}", step.index),
            request_model: format!("Step{}Request", step.index),
            form_var,
            fields,
            prompt_vars,
        });
    }

    Ok(PreparedWorkflow {
        schema,
        class_base: pascal_case(&module),
        module,
        steps,
    })
}

// ---------------------------------------------------------------------------
// TemplateRenderer
// ---------------------------------------------------------------------------

/// Renders the four artifacts of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRenderer {
    route_prefix: String,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_PREFIX)
    }
}

impl TemplateRenderer {
    /// `route_prefix` is normalised to one leading and no trailing slash.
    pub fn new(route_prefix: impl AsRef<str>) -> Self {
        let trimmed = route_prefix.as_ref().trim().trim_matches('/');
        let route_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self { route_prefix }
    }

    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    /// URL path serving `handler` of `workflow_id`.
    pub fn route_path(&self, workflow_id: &str, handler: &str) -> String {
        format!("{}/{}/{}", self.route_prefix, workflow_id, handler)
    }

    /// Render one artifact.
    pub fn render(&self, schema: &WorkflowSchema, kind: ArtifactKind) -> Result<String, RenderError> {
        let prepared = prepare(schema)?;
        self.render_prepared(&prepared, kind)
    }

    /// Render all four artifacts at their layout paths, or none.
    pub fn render_all(
        &self,
        schema: &WorkflowSchema,
        layout: &ArtifactLayout,
    ) -> Result<Vec<GenerationArtifact>, RenderError> {
        let prepared = prepare(schema)?;
        ArtifactKind::ALL
            .iter()
            .map(|&kind| {
                let content = self.render_prepared(&prepared, kind)?;
                Ok(GenerationArtifact::new(
                    kind,
                    layout.target_path(&schema.id, kind),
                    content,
                ))
            })
            .collect()
    }

    /// Python fragment a host server can paste in to mount the plugin by hand.
    pub fn integration_snippet(&self, schema: &WorkflowSchema) -> Result<String, RenderError> {
        Ok(snippet::render(&prepare(schema)?))
    }

    fn render_prepared(
        &self,
        prepared: &PreparedWorkflow<'_>,
        kind: ArtifactKind,
    ) -> Result<String, RenderError> {
        match kind {
            ArtifactKind::BackendPlugin => Ok(backend::render(self, prepared)),
            ArtifactKind::FrontendComponent => Ok(frontend::render(prepared)),
            ArtifactKind::ConfigDescriptor => descriptors::config_descriptor(prepared.schema),
            ArtifactKind::SchemaDescriptor => descriptors::schema_descriptor(prepared.schema),
        }
    }
}
