//! Backend plugin artifact: a Python module exposing one FastAPI route and
//! one pydantic request model per step.

use std::collections::BTreeSet;

use plugins::HandlerKind;

use super::code::CodeWriter;
use super::ident::{python_literal, quote};
use super::types::{type_mapping, Bounds};
use super::{PreparedField, PreparedStep, PreparedWorkflow, TemplateRenderer};
use crate::models::{ParameterType, StepType, ValidationRule};
use crate::plugin::handler_kind;

const INDENT: &str = "    ";

pub fn render(renderer: &TemplateRenderer, wf: &PreparedWorkflow<'_>) -> String {
    let mut w = CodeWriter::new(INDENT);
    let schema = wf.schema;

    w.line(quote(&format!("Generated backend plugin for {}.", schema.name)));
    w.blank();
    write_imports(&mut w, wf);
    w.blank();
    w.blank();
    w.block("class StepResponse(BaseModel):", None, |w| {
        w.line("success: bool");
        w.line("data: Optional[Dict[str, Any]] = None");
        w.line("message: Optional[str] = None");
    });

    for step in &wf.steps {
        w.blank();
        w.blank();
        write_request_model(&mut w, step);
    }

    w.blank();
    w.blank();
    let class = wf.plugin_class();
    w.block(format!("class {class}(BasePlugin):"), None, |w| {
        w.line(quote(&format!("Plugin serving the {} workflow.", schema.name)));
        w.blank();
        w.block("def __init__(self):", None, |w| {
            w.line("super().__init__()");
            w.line("self.llm_manager: Optional[LLMManager] = None");
            w.line("self.logger = logging.getLogger(__name__)");
        });
        w.blank();
        w.line("@property");
        w.block("def metadata(self) -> PluginMetadata:", None, |w| {
            w.block("return PluginMetadata(", Some(")"), |w| {
                w.line(format!("name={},", quote(&schema.id)));
                w.line(format!("version={},", quote(&schema.version)));
                w.line(format!("description={},", quote(&schema.description)));
                w.line(format!("author={},", quote("Auto-generated")));
                w.line(format!("category={},", quote(&schema.category)));
            });
        });
        w.blank();
        w.block("async def initialize(self) -> bool:", None, |w| {
            w.block("try:", None, |w| {
                w.line("self.llm_manager = LLMManager()");
                w.line("await self.llm_manager.initialize()");
                w.line("return True");
            });
            w.block("except Exception as exc:", None, |w| {
                w.line(format!(
                    "self.logger.error({}, exc)",
                    quote(&format!("Failed to initialize {class}: %s"))
                ));
                w.line("return False");
            });
        });
        w.blank();
        w.block("async def cleanup(self) -> bool:", None, |w| {
            w.block("if self.llm_manager:", None, |w| {
                w.line("await self.llm_manager.cleanup()");
            });
            w.line("return True");
        });
        w.blank();
        w.block("def get_api_routes(self) -> List[Dict[str, Any]]:", None, |w| {
            w.block("return [", Some("]"), |w| {
                for step in &wf.steps {
                    w.block("{", Some("},"), |w| {
                        let path = renderer.route_path(&schema.id, &step.handler);
                        w.line(format!("\"path\": {},", quote(&path)));
                        w.line("\"method\": \"POST\",");
                        w.line(format!("\"handler\": self.{},", step.handler));
                        w.line(format!("\"request_model\": {},", step.request_model));
                        w.line("\"response_model\": StepResponse,");
                    });
                }
            });
        });

        for step in &wf.steps {
            w.blank();
            write_handler(w, step);
        }
    });

    w.blank();
    w.blank();
    w.line(format!("plugin_instance = {class}()"));
    w.finish()
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

fn write_imports(w: &mut CodeWriter, wf: &PreparedWorkflow<'_>) {
    let types: BTreeSet<ParameterType> = wf
        .steps
        .iter()
        .flat_map(|s| s.fields.iter().map(|f| f.param.param_type))
        .collect();
    let has = |ty| types.contains(&ty);
    // Only the unconfigured LLM prompt serialises the request with `json`.
    let needs_json = wf
        .steps
        .iter()
        .any(|s| s.step.step_type == StepType::LlmProcessing && s.step.llm_config.is_none());

    if needs_json {
        w.line("import json");
    }
    w.line("import logging");
    if has(ParameterType::Date) {
        w.line("from datetime import date");
    }
    let mut typing = vec!["Any", "Dict", "List"];
    if has(ParameterType::Select) || has(ParameterType::Multiselect) {
        typing.push("Literal");
    }
    typing.push("Optional");
    w.line(format!("from typing import {}", typing.join(", ")));
    w.blank();
    w.line("from fastapi import HTTPException");
    let mut pydantic = vec!["BaseModel"];
    if has(ParameterType::Email) {
        pydantic.push("EmailStr");
    }
    pydantic.push("Field");
    if has(ParameterType::Url) {
        pydantic.push("HttpUrl");
    }
    w.line(format!("from pydantic import {}", pydantic.join(", ")));
    w.blank();
    w.line("from base_plugin import BasePlugin, PluginMetadata");
    w.line("from llm_manager import LLMManager");
}

// ---------------------------------------------------------------------------
// Request models
// ---------------------------------------------------------------------------

fn write_request_model(w: &mut CodeWriter, step: &PreparedStep<'_>) {
    w.block(format!("class {}(BaseModel):", step.request_model), None, |w| {
        if step.fields.is_empty() {
            w.line("pass");
        }
        for field in &step.fields {
            w.line(field_declaration(field));
        }
    });
}

fn annotation(field: &PreparedField<'_>) -> String {
    let base = type_mapping(field.param.param_type).python;
    if field.param.param_type.is_choice() {
        let choices: Vec<String> = field.param.options.iter().map(|o| quote(o)).collect();
        base.replace("{choices}", &choices.join(", "))
    } else {
        base.to_owned()
    }
}

/// `name: type = Field(default, constraints..., description=...)`.
fn field_declaration(field: &PreparedField<'_>) -> String {
    let param = field.param;
    let mapping = type_mapping(param.param_type);
    let mut annotation = annotation(field);

    // A conditionally shown field cannot be enforced server-side.
    let enforced = param.is_required() && param.visible_when.is_none();
    let default = match &param.default {
        _ if enforced => "...".to_owned(),
        Some(value) if !value.is_null() => python_literal(value),
        _ => {
            annotation = format!("Optional[{annotation}]");
            "None".to_owned()
        }
    };

    let mut args = vec![default];
    for rule in &param.validation {
        match (rule, mapping.bounds) {
            (ValidationRule::Min { value, .. }, Bounds::Value) => args.push(format!("ge={value}")),
            (ValidationRule::Max { value, .. }, Bounds::Value) => args.push(format!("le={value}")),
            (ValidationRule::Min { value, .. }, Bounds::Length) => {
                args.push(format!("min_length={}", *value as u64))
            }
            (ValidationRule::Max { value, .. }, Bounds::Length) => {
                args.push(format!("max_length={}", *value as u64))
            }
            (ValidationRule::Pattern { pattern, .. }, _) if mapping.pattern => {
                args.push(format!("pattern={}", quote(pattern)))
            }
            _ => {}
        }
    }
    let description = param.description.clone().unwrap_or_else(|| param.display_label());
    args.push(format!("description={}", quote(&description)));

    format!("{}: {} = Field({})", field.ident, annotation, args.join(", "))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn write_handler(w: &mut CodeWriter, step: &PreparedStep<'_>) {
    let signature = format!(
        "async def {}(self, request: {}) -> StepResponse:",
        step.handler, step.request_model
    );
    let docstring = if step.step.description.is_empty() {
        format!("Execute {}", step.step.name)
    } else {
        step.step.description.clone()
    };
    let step_id = quote(&step.handler);

    w.block(signature, None, |w| {
        w.line(quote(&docstring));
        w.block("try:", None, |w| {
            w.line(format!(
                "self.logger.info({})",
                quote(&format!("Executing step: {}", step.handler))
            ));
            write_handler_body(w, step, &step_id);
            w.block("return StepResponse(", Some(")"), |w| {
                w.line("success=True,");
                w.line("data=result_data,");
                w.line(format!(
                    "message={},",
                    quote(&format!("{} completed successfully", step.step.name))
                ));
            });
        });
        w.block("except HTTPException:", None, |w| {
            w.line("raise");
        });
        w.block("except Exception as exc:", None, |w| {
            w.line(format!(
                "self.logger.error({}, exc)",
                quote(&format!("Error in {}: %s", step.handler))
            ));
            w.block("return StepResponse(", Some(")"), |w| {
                w.line("success=False,");
                w.line(format!(
                    "message={} + str(exc),",
                    quote(&format!("Error in {}: ", step.step.name))
                ));
            });
        });
    });
}

fn write_handler_body(w: &mut CodeWriter, step: &PreparedStep<'_>, step_id: &str) {
    match handler_kind(step) {
        HandlerKind::FormInput { .. } => {
            w.line("result_data = request.model_dump(mode=\"json\")");
        }
        HandlerKind::LlmProcessing { provider_parameter } => {
            w.block("if not self.llm_manager:", None, |w| {
                w.line("raise HTTPException(status_code=500, detail=\"LLM manager not initialized\")");
            });
            let (exclude, provider) = match &provider_parameter {
                Some(p) => (
                    format!(", exclude={{{}}}", quote(p)),
                    format!("request.{p} or \"openai\""),
                ),
                None => (String::new(), "\"openai\"".to_owned()),
            };
            let config = step.step.llm_config.as_ref();
            match config {
                Some(config) => {
                    w.block("template_vars = {", Some("}"), |w| {
                        for (var, ident) in &step.prompt_vars {
                            w.line(format!(
                                "{}: \"\" if request.{ident} is None else request.{ident},",
                                quote(var)
                            ));
                        }
                    });
                    w.line(format!(
                        "prompt = {}.format(**template_vars)",
                        quote(&config.user_prompt_template)
                    ));
                }
                None => {
                    w.line(format!("payload = request.model_dump(mode=\"json\"{exclude})"));
                    let instruction = if step.step.description.is_empty() {
                        step.step.name.clone()
                    } else {
                        step.step.description.clone()
                    };
                    w.line(format!(
                        "prompt = {} + \"\\n\\n\" + json.dumps(payload, indent=2)",
                        quote(&instruction)
                    ));
                }
            }
            w.block("messages = [", Some("]"), |w| {
                if let Some(system) = config.and_then(|c| c.system_prompt.as_ref()) {
                    w.line(format!("{{\"role\": \"system\", \"content\": {}}},", quote(system)));
                }
                w.line("{\"role\": \"user\", \"content\": prompt},");
            });
            w.block("response = await self.llm_manager.generate(", Some(")"), |w| {
                w.line(format!("provider_name={provider},"));
                w.line("messages=messages,");
                if let Some(max_tokens) = config.and_then(|c| c.max_tokens) {
                    w.line(format!("max_tokens={max_tokens},"));
                }
                if let Some(temperature) = config.and_then(|c| c.temperature) {
                    w.line(format!("temperature={temperature},"));
                }
            });
            w.line(format!(
                "result_data = {{\"llm_response\": response, \"step_id\": {step_id}}}"
            ));
        }
        HandlerKind::FileProcessing { file_parameters } => {
            w.block("result_data = {", Some("}"), |w| {
                w.line("\"message\": \"File processing completed\",");
                w.line(format!("\"step_id\": {step_id},"));
                w.block("\"file_sizes\": {", Some("},"), |w| {
                    for p in &file_parameters {
                        w.line(format!("{}: len(request.{p} or b\"\"),", quote(p)));
                    }
                });
            });
        }
        HandlerKind::HttpRequest { url_parameter } => {
            w.block("result_data = {", Some("}"), |w| {
                w.line("\"message\": \"HTTP request completed\",");
                w.line(format!("\"step_id\": {step_id},"));
                if let Some(p) = &url_parameter {
                    w.line(format!(
                        "\"url\": str(request.{p}) if request.{p} else None,"
                    ));
                }
            });
        }
        HandlerKind::CodeExecution => {
            w.block("result_data = {", Some("}"), |w| {
                w.line("\"message\": \"Code execution completed\",");
                w.line(format!("\"step_id\": {step_id},"));
                w.line("\"request_data\": request.model_dump(mode=\"json\"),");
            });
        }
        HandlerKind::DataTransformation => {
            w.block("result_data = {", Some("}"), |w| {
                w.line("\"message\": \"Data transformation completed\",");
                w.line(format!("\"step_id\": {step_id},"));
                w.line("\"request_data\": request.model_dump(mode=\"json\"),");
            });
        }
    }
}
