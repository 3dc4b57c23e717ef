//! Frontend component artifact: one React form component per workflow.
//!
//! Every piece of schema-provided text reaches the TSX through [`quote`],
//! either as a `{"..."}` JSX expression or as a string literal, so no
//! user text is ever parsed as markup.

use std::collections::BTreeSet;

use super::code::CodeWriter;
use super::ident::{quote, ts_literal};
use super::types::{type_mapping, Bounds, InitialValue, Widget};
use super::{PreparedField, PreparedStep, PreparedWorkflow};
use crate::models::{ValidationRule, VisibilityCondition};

const INDENT: &str = "  ";

pub fn render(wf: &PreparedWorkflow<'_>) -> String {
    let mut w = CodeWriter::new(INDENT);
    let component = wf.component();

    write_imports(&mut w, wf);
    w.blank();
    w.block(format!("interface {component}Props {{"), Some("}"), |w| {
        w.line("appId: string;");
    });
    w.blank();
    w.line("type StepStatus = 'pending' | 'running' | 'completed' | 'error';");
    w.blank();
    w.block("interface StepState {", Some("}"), |w| {
        w.line("id: string;");
        w.line("name: string;");
        w.line("status: StepStatus;");
        w.line("result?: unknown;");
        w.line("error?: string;");
    });
    for step in &wf.steps {
        w.blank();
        w.block(format!("interface {} {{", step.form_type()), Some("}"), |w| {
            for field in &step.fields {
                w.line(format!("{}: {};", field.ident, ts_type(field)));
            }
        });
    }
    w.blank();

    w.block(
        format!("const {component}: React.FC<{component}Props> = ({{ appId }}) => {{"),
        Some("};"),
        |w| {
            w.line("const { updateWorkflowStep } = useWorkflowStore();");
            w.line("const [currentStepIndex, setCurrentStepIndex] = useState(0);");
            w.line("const [isExecuting, setIsExecuting] = useState(false);");
            w.block("const [steps, setSteps] = useState<StepState[]>([", Some("]);"), |w| {
                for step in &wf.steps {
                    w.line(format!(
                        "{{ id: {}, name: {}, status: 'pending' }},",
                        quote(&step.handler),
                        quote(&step.step.name)
                    ));
                }
            });
            for step in &wf.steps {
                w.blank();
                w.block(
                    format!(
                        "const [{}, {}] = useState<{}>({{",
                        step.form_var,
                        step.form_setter(),
                        step.form_type()
                    ),
                    Some("});"),
                    |w| {
                        for field in &step.fields {
                            w.line(format!("{}: {},", field.ident, initial_value(field)));
                        }
                    },
                );
            }
            w.blank();
            write_execute(w);
            w.blank();
            write_step_forms(w, wf);
            w.blank();
            write_layout(w, wf);
        },
    );
    w.blank();
    w.line(format!("export default {component};"));
    w.finish()
}

// ---------------------------------------------------------------------------
// Imports and types
// ---------------------------------------------------------------------------

fn widgets(wf: &PreparedWorkflow<'_>) -> BTreeSet<&'static str> {
    wf.steps
        .iter()
        .flat_map(|s| s.fields.iter())
        .filter_map(|f| match type_mapping(f.param.param_type).widget {
            Widget::Input { .. } => Some("Input"),
            Widget::Select => Some("Select"),
            Widget::FileUpload => Some("FileUpload"),
            Widget::TextArea | Widget::JsonEditor => Some("TextArea"),
            Widget::Checkbox | Widget::MultiSelect => None,
        })
        .collect()
}

fn write_imports(w: &mut CodeWriter, wf: &PreparedWorkflow<'_>) {
    w.line("import React, { useState } from 'react';");
    w.line("import { useWorkflowStore } from '../store/workflowStore';");
    w.line("import { appApiService } from '../services/appApiService';");
    w.line("import { Button } from '../components/ui/Button';");
    w.line("import { Card, CardContent } from '../components/ui/Card';");
    for widget in widgets(wf) {
        w.line(format!("import {{ {widget} }} from '../components/ui/{widget}';"));
    }
}

fn choices(field: &PreparedField<'_>) -> String {
    let options: Vec<String> = field.param.options.iter().map(|o| quote(o)).collect();
    options.join(" | ")
}

fn ts_type(field: &PreparedField<'_>) -> String {
    let base = type_mapping(field.param.param_type).typescript;
    if field.param.param_type.is_choice() {
        base.replace("{choices}", &choices(field))
    } else {
        base.to_owned()
    }
}

fn initial_value(field: &PreparedField<'_>) -> String {
    if let Some(default) = &field.param.default {
        if !default.is_null() {
            return ts_literal(default);
        }
    }
    match type_mapping(field.param.param_type).initial {
        InitialValue::EmptyString => "\"\"".to_owned(),
        InitialValue::Zero => "0".to_owned(),
        InitialValue::False => "false".to_owned(),
        InitialValue::Null => "null".to_owned(),
        InitialValue::EmptyArray => "[]".to_owned(),
        InitialValue::EmptyObject => "{}".to_owned(),
        InitialValue::FirstOption => field
            .param
            .options
            .first()
            .map(|o| quote(o))
            .unwrap_or_else(|| "\"\"".to_owned()),
    }
}

// ---------------------------------------------------------------------------
// Component body
// ---------------------------------------------------------------------------

fn write_execute(w: &mut CodeWriter) {
    w.block(
        "const updateStepStatus = (stepId: string, status: StepStatus, result?: unknown, error?: string) => {",
        Some("};"),
        |w| {
            w.line("setSteps(prev => prev.map(step => (step.id === stepId ? { ...step, status, result, error } : step)));");
        },
    );
    w.blank();
    w.block(
        "const executeStep = async (stepId: string, payload: object) => {",
        Some("};"),
        |w| {
            w.line("setIsExecuting(true);");
            w.line("updateStepStatus(stepId, 'running');");
            w.block("try {", None, |w| {
                w.line("const response = await appApiService.executeStep(appId, stepId, payload);");
                w.block("if (response.success) {", None, |w| {
                    w.line("updateStepStatus(stepId, 'completed', response.data);");
                    w.line("updateWorkflowStep(appId, stepId, response.data);");
                    w.line("setCurrentStepIndex(prev => Math.min(prev + 1, steps.length - 1));");
                });
                w.block("} else {", None, |w| {
                    w.line("updateStepStatus(stepId, 'error', undefined, response.message);");
                });
                w.line("}");
            });
            w.block("} catch (error) {", None, |w| {
                w.line("updateStepStatus(stepId, 'error', undefined, error instanceof Error ? error.message : 'Unknown error');");
            });
            w.block("} finally {", Some("}"), |w| {
                w.line("setIsExecuting(false);");
            });
        },
    );
}

fn write_step_forms(w: &mut CodeWriter, wf: &PreparedWorkflow<'_>) {
    w.block("const renderStepForm = () => {", Some("};"), |w| {
        w.block("switch (steps[currentStepIndex]?.id) {", Some("}"), |w| {
            for step in &wf.steps {
                w.block(format!("case {}:", quote(&step.handler)), None, |w| {
                    w.block("return (", Some(");"), |w| {
                        write_step_form(w, step);
                    });
                });
            }
            w.block("default:", None, |w| {
                w.line("return <div>Unknown step</div>;");
            });
        });
    });
}

fn write_step_form(w: &mut CodeWriter, step: &PreparedStep<'_>) {
    w.block("<div className=\"space-y-4\">", Some("</div>"), |w| {
        w.line(format!(
            "<h3 className=\"text-lg font-semibold\">{{{}}}</h3>",
            quote(&step.step.name)
        ));
        if !step.step.description.is_empty() {
            w.line(format!(
                "<p className=\"text-gray-600\">{{{}}}</p>",
                quote(&step.step.description)
            ));
        }
        for field in &step.fields {
            match visibility_condition(field) {
                Some(condition) => {
                    w.block(format!("{{{condition} && ("), Some(")}"), |w| {
                        write_field(w, step, field);
                    });
                }
                None => write_field(w, step, field),
            }
        }
        w.line(format!(
            "<Button onClick={{() => executeStep({}, {})}} disabled={{isExecuting}} className=\"w-full\">",
            quote(&step.handler),
            step.form_var
        ));
        w.indent();
        w.line(format!(
            "{{isExecuting ? {} : {}}}",
            quote(&format!("Running {}...", step.step.name)),
            quote(&format!("Start {}", step.step.name))
        ));
        w.dedent();
        w.line("</Button>");
    });
}

/// JSX condition for a conditionally shown field.
fn visibility_condition(field: &PreparedField<'_>) -> Option<String> {
    let visibility = field.visibility.as_ref()?;
    let target = &visibility.target;
    Some(match visibility.condition {
        VisibilityCondition::Equals { value } => format!("{target} === {}", ts_literal(value)),
        VisibilityCondition::NotEquals { value } => format!("{target} !== {}", ts_literal(value)),
        VisibilityCondition::Truthy => format!("Boolean({target})"),
    })
}

fn write_field(w: &mut CodeWriter, step: &PreparedStep<'_>, field: &PreparedField<'_>) {
    let param = field.param;
    let mapping = type_mapping(param.param_type);
    let required = param.is_required();
    let value = format!("{}.{}", step.form_var, field.ident);
    let set = step.form_setter();
    let ident = &field.ident;

    let mut constraints = Vec::new();
    for rule in &param.validation {
        match (rule, mapping.bounds, mapping.widget) {
            (_, _, Widget::MultiSelect) => {}
            (ValidationRule::Min { value, .. }, Bounds::Value, _) => {
                constraints.push(format!("min={{{value}}}"))
            }
            (ValidationRule::Max { value, .. }, Bounds::Value, _) => {
                constraints.push(format!("max={{{value}}}"))
            }
            (ValidationRule::Min { value, .. }, Bounds::Length, _) => {
                constraints.push(format!("minLength={{{}}}", *value as u64))
            }
            (ValidationRule::Max { value, .. }, Bounds::Length, _) => {
                constraints.push(format!("maxLength={{{}}}", *value as u64))
            }
            (ValidationRule::Pattern { pattern, .. }, _, _) if mapping.pattern => {
                constraints.push(format!("pattern={{{}}}", quote(pattern)))
            }
            _ => {}
        }
    }
    let placeholder = param.placeholder.as_deref().unwrap_or_default();

    w.block("<div>", Some("</div>"), |w| {
        w.block(
            "<label className=\"block text-sm font-medium text-gray-700 mb-1\">",
            Some("</label>"),
            |w| {
                w.line(format!("{{{}}}", quote(&param.display_label())));
                if required {
                    w.line("<span className=\"text-red-500\">*</span>");
                }
            },
        );

        let open = match mapping.widget {
            Widget::Input { .. } => "<Input",
            Widget::TextArea | Widget::JsonEditor => "<TextArea",
            Widget::Select => "<Select",
            Widget::Checkbox => "<input",
            Widget::MultiSelect => "<select",
            Widget::FileUpload => "<FileUpload",
        };
        w.line(open);
        w.indent();
        match mapping.widget {
            Widget::Input { input_type } => {
                w.line(format!("type=\"{input_type}\""));
                w.line(format!("value={{{value}}}"));
                if input_type == "number" {
                    w.line(format!(
                        "onChange={{(e) => {set}(prev => ({{ ...prev, {ident}: parseFloat(e.target.value) || 0 }}))}}"
                    ));
                } else {
                    w.line(format!(
                        "onChange={{(e) => {set}(prev => ({{ ...prev, {ident}: e.target.value }}))}}"
                    ));
                }
                w.line(format!("placeholder={{{}}}", quote(placeholder)));
            }
            Widget::TextArea => {
                w.line(format!("value={{{value}}}"));
                w.line(format!(
                    "onChange={{(e) => {set}(prev => ({{ ...prev, {ident}: e.target.value }}))}}"
                ));
                w.line(format!("placeholder={{{}}}", quote(placeholder)));
                w.line("rows={4}");
            }
            Widget::JsonEditor => {
                w.line(format!("value={{JSON.stringify({value}, null, 2)}}"));
                w.line(format!(
                    "onChange={{(e) => {{ try {{ const parsed = JSON.parse(e.target.value); {set}(prev => ({{ ...prev, {ident}: parsed }})); }} catch {{ /* keep last valid value */ }} }}}}"
                ));
                w.line("rows={6}");
            }
            Widget::Checkbox => {
                w.line("type=\"checkbox\"");
                w.line(format!("checked={{{value}}}"));
                w.line(format!(
                    "onChange={{(e) => {set}(prev => ({{ ...prev, {ident}: e.target.checked }}))}}"
                ));
                w.line("className=\"w-4 h-4 text-blue-600 border-gray-300 rounded\"");
            }
            Widget::Select => {
                w.line(format!("value={{{value}}}"));
                w.line(format!(
                    "onChange={{(value) => {set}(prev => ({{ ...prev, {ident}: value as {}[{}] }}))}}",
                    step.form_type(),
                    quote(ident)
                ));
            }
            Widget::MultiSelect => {
                w.line("multiple");
                w.line(format!("value={{{value}}}"));
                w.line(format!(
                    "onChange={{(e) => {set}(prev => ({{ ...prev, {ident}: Array.from(e.target.selectedOptions, (o) => o.value) as {}[{}] }}))}}",
                    step.form_type(),
                    quote(ident)
                ));
            }
            Widget::FileUpload => {
                w.line(format!(
                    "onFileSelect={{(file) => {set}(prev => ({{ ...prev, {ident}: file }}))}}"
                ));
                w.line("accept=\"*/*\"");
            }
        }
        for constraint in &constraints {
            w.line(constraint);
        }
        if !matches!(mapping.widget, Widget::Checkbox | Widget::JsonEditor) {
            w.line(format!("required={{{required}}}"));
        }
        w.dedent();

        if param.param_type.is_choice() {
            w.line(">");
            w.indent();
            for option in &param.options {
                let option = quote(option);
                w.line(format!("<option value={{{option}}}>{{{option}}}</option>"));
            }
            w.dedent();
            w.line(if mapping.widget == Widget::Select { "</Select>" } else { "</select>" });
        } else {
            w.line("/>");
        }

        if let Some(description) = &param.description {
            w.line(format!(
                "<p className=\"text-xs text-gray-500 mt-1\">{{{}}}</p>",
                quote(description)
            ));
        }
    });
}

fn write_layout(w: &mut CodeWriter, wf: &PreparedWorkflow<'_>) {
    w.line("const current = steps[currentStepIndex];");
    w.blank();
    w.block("return (", Some(");"), |w| {
        w.block("<div className=\"max-w-4xl mx-auto p-6\">", Some("</div>"), |w| {
            w.line(format!(
                "<h1 className=\"text-2xl font-bold mb-6\">{{{}}}</h1>",
                quote(&wf.schema.name)
            ));
            w.block("<ol className=\"flex items-center space-x-4 mb-8\">", Some("</ol>"), |w| {
                w.block("{steps.map((step, index) => (", Some("))}"), |w| {
                    w.block(
                        "<li key={step.id} className={index === currentStepIndex ? 'font-semibold' : ''}>",
                        Some("</li>"),
                        |w| {
                            w.line("{step.name} ({step.status})");
                        },
                    );
                });
            });
            w.block("<Card>", Some("</Card>"), |w| {
                w.block("<CardContent className=\"p-6\">", Some("</CardContent>"), |w| {
                    w.line("{renderStepForm()}");
                    w.block("{current?.result !== undefined && (", Some(")}"), |w| {
                        w.block(
                            "<pre className=\"text-xs bg-gray-50 p-2 rounded overflow-auto max-h-64\">",
                            Some("</pre>"),
                            |w| {
                                w.line("{JSON.stringify(current.result, null, 2)}");
                            },
                        );
                    });
                    w.block("{current?.error && (", Some(")}"), |w| {
                        w.line("<p className=\"text-red-800 text-sm\">Error: {current.error}</p>");
                    });
                });
            });
            w.block("<div className=\"flex justify-between mt-6\">", Some("</div>"), |w| {
                w.line("<Button variant=\"outline\" onClick={() => setCurrentStepIndex(prev => Math.max(0, prev - 1))} disabled={currentStepIndex === 0}>");
                w.line("  Previous");
                w.line("</Button>");
                w.line("<Button variant=\"outline\" onClick={() => setCurrentStepIndex(prev => Math.min(steps.length - 1, prev + 1))} disabled={currentStepIndex === steps.length - 1}>");
                w.line("  Next");
                w.line("</Button>");
            });
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Parameter, ParameterType, Step, StepType, VisibleWhen, WorkflowSchema};
    use crate::render::prepare;
    use serde_json::json;

    fn schema() -> WorkflowSchema {
        WorkflowSchema::new(
            "Hello Workflow",
            "",
            "demo",
            vec![
                Step::new(
                    1,
                    "User Name Input",
                    StepType::FormInput,
                    "Execute user name input",
                    vec![
                        Parameter::new("user_input", ParameterType::String).required(),
                        Parameter::new("mode", ParameterType::Select).with_options(["a", "b"]),
                    ],
                ),
                Step::new(
                    2,
                    "Upload",
                    StepType::FileProcessing,
                    "",
                    vec![
                        Parameter::new("data_file", ParameterType::File).required(),
                        Parameter::new("notes", ParameterType::TextArea).visible_when(VisibleWhen {
                            step: Some(1),
                            parameter: "mode".into(),
                            condition: VisibilityCondition::Equals { value: json!("b") },
                        }),
                    ],
                ),
            ],
        )
    }

    fn render_schema(schema: &WorkflowSchema) -> String {
        render(&prepare(schema).unwrap())
    }

    #[test]
    fn component_is_named_after_the_id_and_default_exported() {
        let text = render_schema(&schema());
        assert!(text.contains(
            "const HelloWorkflowWorkflow: React.FC<HelloWorkflowWorkflowProps> = ({ appId }) => {"
        ));
        assert!(text.ends_with("export default HelloWorkflowWorkflow;\n"));
    }

    #[test]
    fn form_state_mirrors_parameters_in_order() {
        let text = render_schema(&schema());
        assert!(text.contains("interface Step1Form {\n  user_input: string;\n  mode: \"a\" | \"b\";\n}"));
        assert!(text.contains("interface Step2Form {\n  data_file: File | null;\n  notes: string;\n}"));
        assert!(text.contains("    user_input: \"\",\n    mode: \"a\",\n"));
        assert!(text.contains("const [step2Form, setStep2Form] = useState<Step2Form>({"));
    }

    #[test]
    fn file_parameter_uses_upload_widget() {
        let text = render_schema(&schema());
        assert!(text.contains("import { FileUpload } from '../components/ui/FileUpload';"));
        assert!(text.contains("onFileSelect={(file) => setStep2Form(prev => ({ ...prev, data_file: file }))}"));
    }

    #[test]
    fn visibility_becomes_conditional_rendering() {
        let text = render_schema(&schema());
        assert!(text.contains("{step1Form.mode === \"b\" && ("));
    }

    #[test]
    fn same_step_visibility_reads_the_sanitized_field() {
        let s = WorkflowSchema::new(
            "Toggle",
            "",
            "demo",
            vec![Step::new(
                1,
                "Options",
                StepType::FormInput,
                "",
                vec![
                    Parameter::new("Send Copy", ParameterType::Boolean),
                    Parameter::new("copy_to", ParameterType::Email).visible_when(VisibleWhen {
                        step: None,
                        parameter: "Send Copy".into(),
                        condition: VisibilityCondition::Truthy,
                    }),
                ],
            )],
        );
        let text = render_schema(&s);
        assert!(text.contains("{Boolean(step1Form.send_copy) && ("));
    }

    #[test]
    fn step_execution_goes_through_the_api_service() {
        let text = render_schema(&schema());
        assert!(text.contains("appApiService.executeStep(appId, stepId, payload)"));
        assert!(text.contains("onClick={() => executeStep(\"step_1\", step1Form)}"));
    }

    #[test]
    fn markup_in_names_stays_inside_string_literals() {
        let mut s = schema();
        s.name = "<script>alert('x')</script>".into();
        let text = render_schema(&s);
        assert!(text.contains("{\"<script>alert('x')</script>\"}"));
    }
}
