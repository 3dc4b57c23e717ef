//! `GeneratedPlugin`: the live-system view of a generated backend plugin.
//!
//! The registrar never loads generated Python. It registers this descriptor,
//! which is derived from the same prepared names as the rendered artifacts,
//! so its routes are exactly the ones `get_api_routes()` returns.

use plugins::{HandlerKind, HandlerRef, HttpMethod, PluginCapabilities, RouteSpec, UiEntry};

use crate::error::RenderError;
use crate::models::{ParameterType, StepType, WorkflowSchema};
use crate::render::{prepare, PreparedStep, TemplateRenderer};

/// What the handler of `step` does, with the identifiers it reads.
pub fn handler_kind(step: &PreparedStep<'_>) -> HandlerKind {
    let idents_of = |ty: ParameterType| {
        step.fields
            .iter()
            .filter(move |f| f.param.param_type == ty)
            .map(|f| f.ident.clone())
    };

    match step.step.step_type {
        StepType::FormInput => HandlerKind::FormInput {
            fields: step.fields.iter().map(|f| f.ident.clone()).collect(),
        },
        StepType::LlmProcessing => HandlerKind::LlmProcessing {
            provider_parameter: idents_of(ParameterType::Select).find(|i| i.contains("provider")),
        },
        StepType::FileProcessing => HandlerKind::FileProcessing {
            file_parameters: idents_of(ParameterType::File).collect(),
        },
        StepType::HttpRequest => HandlerKind::HttpRequest {
            url_parameter: idents_of(ParameterType::Url).next(),
        },
        StepType::CodeExecution => HandlerKind::CodeExecution,
        StepType::DataTransformation => HandlerKind::DataTransformation,
    }
}

/// Route table, handlers and UI entry of one generated workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPlugin {
    workflow_id: String,
    routes: Vec<RouteSpec>,
    handlers: Vec<HandlerRef>,
    ui: UiEntry,
}

impl GeneratedPlugin {
    pub fn from_schema(
        schema: &WorkflowSchema,
        renderer: &TemplateRenderer,
    ) -> Result<Self, RenderError> {
        let prepared = prepare(schema)?;

        let routes = prepared
            .steps
            .iter()
            .map(|s| RouteSpec {
                path: renderer.route_path(&schema.id, &s.handler),
                method: HttpMethod::Post,
                handler: s.handler.clone(),
            })
            .collect();

        let handlers = prepared
            .steps
            .iter()
            .map(|s| HandlerRef {
                step_index: s.step.index,
                name: s.handler.clone(),
                kind: handler_kind(s),
            })
            .collect();

        let ui = UiEntry {
            component: prepared.component(),
            module: format!("./{}_workflow", schema.id),
            title: schema.name.clone(),
        };

        Ok(Self {
            workflow_id: schema.id.clone(),
            routes,
            handlers,
            ui,
        })
    }

    pub fn ui_entry(&self) -> &UiEntry {
        &self.ui
    }
}

impl PluginCapabilities for GeneratedPlugin {
    fn plugin_id(&self) -> &str {
        &self.workflow_id
    }

    fn routes(&self) -> Vec<RouteSpec> {
        self.routes.clone()
    }

    fn handler(&self, step_index: u32) -> Option<HandlerRef> {
        self.handlers
            .iter()
            .find(|h| h.step_index == step_index)
            .cloned()
    }
}
