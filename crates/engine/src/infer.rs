//! Step type inference from free-text task descriptions.
//!
//! The rules live in one ranked table ([`RULES`]). A task is lowercased and
//! split into alphanumeric tokens; a rule matches when any of its keywords
//! equals a token. Rules are tried top to bottom and the first match wins,
//! so the order below is part of the contract:
//!
//! | rank | rule        | step type             |
//! |------|-------------|-----------------------|
//! | 1    | `llm`       | `LLM_PROCESSING`      |
//! | 2    | `file`      | `FILE_PROCESSING`     |
//! | 3    | `http`      | `HTTP_REQUEST`        |
//! | 4    | `code`      | `CODE_EXECUTION`      |
//! | 5    | `transform` | `DATA_TRANSFORMATION` |
//! | 6    | `input`     | `FORM_INPUT`          |
//! | -    | fallback    | `FORM_INPUT`          |
//!
//! `LLM_PROCESSING` steps built from a task also carry a prompt that
//! embeds the task text and reads the `input_data` parameter.
//!
//! Any change to keywords, order, default parameters or the default prompt
//! bumps [`RULE_TABLE_VERSION`].

use std::fmt;

use serde_json::json;

use crate::models::{
    title_case, LlmConfig, Parameter, ParameterType, Step, StepType, ValidationRule,
};

/// Version of [`RULES`].
pub const RULE_TABLE_VERSION: u32 = 2;

/// Identifier reported for tasks no rule matched.
pub const FALLBACK_RULE: &str = "fallback";

/// One row of the rule table.
pub struct InferenceRule {
    pub id: &'static str,
    pub keywords: &'static [&'static str],
    pub step_type: StepType,
    pub parameters: fn() -> Vec<Parameter>,
}

pub static RULES: &[InferenceRule] = &[
    InferenceRule {
        id: "llm",
        keywords: &[
            "ai", "llm", "gpt", "claude", "generate", "generation", "analysis", "analyze",
            "analyse", "summarize", "summary", "classify", "prompt",
        ],
        step_type: StepType::LlmProcessing,
        parameters: llm_parameters,
    },
    InferenceRule {
        id: "file",
        keywords: &["upload", "file", "files", "document", "csv", "pdf", "attachment"],
        step_type: StepType::FileProcessing,
        parameters: file_parameters,
    },
    InferenceRule {
        id: "http",
        keywords: &[
            "url", "fetch", "crawl", "scrape", "http", "api", "request", "download", "webhook",
        ],
        step_type: StepType::HttpRequest,
        parameters: http_parameters,
    },
    InferenceRule {
        id: "code",
        keywords: &["execute", "execution", "run", "script", "code", "test", "testing"],
        step_type: StepType::CodeExecution,
        parameters: code_parameters,
    },
    InferenceRule {
        id: "transform",
        keywords: &[
            "transform", "transformation", "convert", "conversion", "format", "formatting",
            "display", "parse", "map", "merge", "filter", "aggregate",
        ],
        step_type: StepType::DataTransformation,
        parameters: transform_parameters,
    },
    InferenceRule {
        id: "input",
        keywords: &["input", "enter", "form", "collect", "configuration", "name", "select"],
        step_type: StepType::FormInput,
        parameters: input_parameters,
    },
];

fn llm_parameters() -> Vec<Parameter> {
    vec![
        Parameter::new("llm_provider", ParameterType::Select)
            .required()
            .with_label("AI Provider")
            .with_options(["openai", "anthropic", "google"])
            .with_default(json!("openai")),
        Parameter::new("input_data", ParameterType::TextArea)
            .with_label("Input Data")
            .with_placeholder("Content for the AI to process"),
    ]
}

fn file_parameters() -> Vec<Parameter> {
    vec![Parameter::new("data_file", ParameterType::File)
        .required()
        .with_label("Data File")]
}

fn http_parameters() -> Vec<Parameter> {
    vec![Parameter::new("page_url", ParameterType::Url)
        .required()
        .with_label("URL")
        .with_placeholder("https://example.com")]
}

fn code_parameters() -> Vec<Parameter> {
    vec![Parameter::new("timeout_seconds", ParameterType::Number)
        .with_label("Timeout (seconds)")
        .with_default(json!(300))
        .with_rule(ValidationRule::Min {
            value: 1.0,
            message: Some("timeout must be at least one second".into()),
        })]
}

fn transform_parameters() -> Vec<Parameter> {
    vec![Parameter::new("input_data", ParameterType::TextArea).with_label("Input Data")]
}

fn input_parameters() -> Vec<Parameter> {
    vec![Parameter::new("user_input", ParameterType::String)
        .required()
        .with_label("Input")]
}

/// Prompt of an inferred LLM step.
fn task_prompt(task: &str) -> LlmConfig {
    let task = task.replace('{', "{{").replace('}', "}}");
    LlmConfig::new(format!(
        "Execute the following task: {task}\n\nInput data: {{input_data}}"
    ))
    .with_variable("input_data")
}

fn fallback_parameters() -> Vec<Parameter> {
    vec![Parameter::new("input_text", ParameterType::String).with_label("Input")]
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// How an inference was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Matched {
        rule: &'static str,
        keyword: &'static str,
    },
    /// No rule matched; the generic form-input default was used.
    Fallback,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched { rule, keyword } => write!(f, "matched rule '{rule}' on '{keyword}'"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// The result of inferring one task.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub step_type: StepType,
    pub parameters: Vec<Parameter>,
    pub confidence: Confidence,
    /// Id of the rule that produced this inference, or [`FALLBACK_RULE`].
    pub rule: &'static str,
}

/// Lowercased alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Infer the step type and default parameters of a task.
pub fn infer(task: &str) -> Inference {
    let tokens = tokenize(task);
    for rule in RULES {
        if let Some(keyword) = rule
            .keywords
            .iter()
            .copied()
            .find(|k| tokens.iter().any(|t| t == k))
        {
            return Inference {
                step_type: rule.step_type,
                parameters: (rule.parameters)(),
                confidence: Confidence::Matched { rule: rule.id, keyword },
                rule: rule.id,
            };
        }
    }
    Inference {
        step_type: StepType::FormInput,
        parameters: fallback_parameters(),
        confidence: Confidence::Fallback,
        rule: FALLBACK_RULE,
    }
}

/// Build the step for the `index`-th task (1-based).
pub fn step_from_task(index: u32, task: &str) -> (Step, Inference) {
    let inference = infer(task);
    let task = task.trim();
    let mut step = Step::new(
        index,
        title_case(task),
        inference.step_type,
        format!("Execute {}", task),
        inference.parameters.clone(),
    );
    if inference.step_type == StepType::LlmProcessing {
        step.llm_config = Some(task_prompt(task));
    }
    (step, inference)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types_of(tasks: &[&str]) -> Vec<StepType> {
        tasks.iter().map(|t| infer(t).step_type).collect()
    }

    #[test]
    fn hello_workflow_tasks() {
        assert_eq!(
            types_of(&[
                "user name input",
                "greeting message generation",
                "personalized response creation",
                "message display",
            ]),
            vec![
                StepType::FormInput,
                StepType::LlmProcessing,
                StepType::FormInput,
                StepType::DataTransformation,
            ]
        );
        assert_eq!(infer("personalized response creation").confidence, Confidence::Fallback);
    }

    #[test]
    fn inference_is_deterministic() {
        let first = infer("ai-powered analysis");
        let second = infer("ai-powered analysis");
        assert_eq!(first, second);
        assert_eq!(first.step_type, StepType::LlmProcessing);
        assert_eq!(first.confidence, Confidence::Matched { rule: "llm", keyword: "ai" });

        let names: Vec<&str> = first.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["llm_provider", "input_data"]);
        assert_eq!(first.parameters[0].options, vec!["openai", "anthropic", "google"]);
        assert_eq!(first.parameters[0].default, Some(json!("openai")));
    }

    #[test]
    fn keywords_match_whole_tokens_only() {
        // "said" contains "ai" but is not the token "ai".
        assert_eq!(infer("said hello").rule, FALLBACK_RULE);
        // "generations" is not "generation".
        assert_eq!(infer("generations").rule, FALLBACK_RULE);
    }

    #[test]
    fn earlier_rule_wins_on_overlap() {
        // "upload" (file) and "input" (input): file ranks higher.
        assert_eq!(infer("upload input").step_type, StepType::FileProcessing);
        // "test" (code) and "configuration" (input): code ranks higher.
        assert_eq!(infer("test configuration").step_type, StepType::CodeExecution);
        // "ai" (llm) and "file" (file): llm ranks higher.
        assert_eq!(infer("AI file summary").step_type, StepType::LlmProcessing);
    }

    #[test]
    fn defaults_per_rule() {
        assert_eq!(infer("fetch page").parameters[0].param_type, ParameterType::Url);
        assert_eq!(infer("upload csv").parameters[0].name, "data_file");
        let code = infer("run script");
        assert_eq!(code.parameters[0].default, Some(json!(300)));
        assert_eq!(infer("").confidence, Confidence::Fallback);
    }

    #[test]
    fn step_from_task_names_and_describes() {
        let (step, inference) = step_from_task(2, "  greeting message generation ");
        assert_eq!(step.id, "step_2");
        assert_eq!(step.index, 2);
        assert_eq!(step.name, "Greeting Message Generation");
        assert_eq!(step.description, "Execute greeting message generation");
        assert_eq!(step.parameters, inference.parameters);
    }

    #[test]
    fn llm_steps_get_a_task_prompt() {
        let (step, _) = step_from_task(1, "summary of {raw} notes");
        let config = step.llm_config.unwrap();
        assert_eq!(
            config.user_prompt_template,
            "Execute the following task: summary of {{raw}} notes\n\nInput data: {input_data}"
        );
        assert_eq!(config.template_variables, vec!["input_data"]);
        assert_eq!(config.response_format, crate::models::ResponseFormat::Text);

        let (form, _) = step_from_task(2, "user name input");
        assert!(form.llm_config.is_none());
    }

    #[test]
    fn every_rule_has_keywords_and_unique_id() {
        let mut ids: Vec<&str> = RULES.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), RULES.len());
        assert!(RULES.iter().all(|r| !r.keywords.is_empty()));
    }
}
