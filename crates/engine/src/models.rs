//! Core domain models for the workflow generator.
//!
//! A [`WorkflowSchema`] is the single source every artifact is rendered
//! from. It serialises to the schema descriptor (`schema.json`) and must
//! deserialise back to an equal value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version stamped on new workflows.
pub const DEFAULT_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Slugs and titles
// ---------------------------------------------------------------------------

/// Derive a workflow id from its name.
///
/// Lowercase; every run of characters outside ASCII `[a-z0-9]` becomes a
/// single `_`; leading and trailing underscores are dropped.
/// `"Hello Workflow"` becomes `hello_workflow`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch);
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Capitalise the first letter of every alphabetic run, lowercase the rest.
///
/// `"ai-powered data analysis"` becomes `"Ai-Powered Data Analysis"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.trim().chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// ParameterType / StepType
// ---------------------------------------------------------------------------

/// Abstract type of a step parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    File,
    Select,
    Multiselect,
    TextArea,
    Json,
    Date,
    Url,
    Email,
}

impl ParameterType {
    /// Choice types carry a mandatory option list.
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Select | Self::Multiselect)
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String      => write!(f, "STRING"),
            Self::Number      => write!(f, "NUMBER"),
            Self::Boolean     => write!(f, "BOOLEAN"),
            Self::File        => write!(f, "FILE"),
            Self::Select      => write!(f, "SELECT"),
            Self::Multiselect => write!(f, "MULTISELECT"),
            Self::TextArea    => write!(f, "TEXT_AREA"),
            Self::Json        => write!(f, "JSON"),
            Self::Date        => write!(f, "DATE"),
            Self::Url         => write!(f, "URL"),
            Self::Email       => write!(f, "EMAIL"),
        }
    }
}

/// Execution kind of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    FormInput,
    LlmProcessing,
    FileProcessing,
    HttpRequest,
    CodeExecution,
    DataTransformation,
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FormInput          => write!(f, "FORM_INPUT"),
            Self::LlmProcessing      => write!(f, "LLM_PROCESSING"),
            Self::FileProcessing     => write!(f, "FILE_PROCESSING"),
            Self::HttpRequest        => write!(f, "HTTP_REQUEST"),
            Self::CodeExecution      => write!(f, "CODE_EXECUTION"),
            Self::DataTransformation => write!(f, "DATA_TRANSFORMATION"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation rules and visibility
// ---------------------------------------------------------------------------

/// A declarative constraint on a parameter value.
///
/// `min`/`max` bound the value of numbers and the length of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    Required {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Min {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Max {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Pattern {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Condition a referenced parameter's value must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum VisibilityCondition {
    Equals { value: Value },
    NotEquals { value: Value },
    Truthy,
}

/// Show a parameter only when another parameter satisfies a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleWhen {
    /// Step index of the referenced parameter; `None` means the same step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    pub parameter: String,
    pub condition: VisibilityCondition,
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// One typed input field of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<VisibleWhen>,
}

impl Parameter {
    /// An optional parameter with nothing but a name and a type.
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            label: None,
            description: None,
            required: false,
            default: None,
            validation: Vec::new(),
            options: Vec::new(),
            placeholder: None,
            visible_when: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation.push(rule);
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn visible_when(mut self, condition: VisibleWhen) -> Self {
        self.visible_when = Some(condition);
        self
    }

    /// Required either by flag or by a `required` rule.
    pub fn is_required(&self) -> bool {
        self.required
            || self
                .validation
                .iter()
                .any(|r| matches!(r, ValidationRule::Required { .. }))
    }

    /// Label shown in the UI: the explicit label, else the title-cased name.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => title_case(&self.name.replace('_', " ")),
        }
    }
}

// ---------------------------------------------------------------------------
// LLM configuration
// ---------------------------------------------------------------------------

/// Shape the LLM is asked to answer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
    Structured,
}

/// Prompt settings of an `LLM_PROCESSING` step.
///
/// `user_prompt_template` holds `{name}` placeholders, one per entry of
/// `template_variables`, each naming a parameter of the same step. Literal
/// braces are doubled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub user_prompt_template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl LlmConfig {
    pub fn new(user_prompt_template: impl Into<String>) -> Self {
        Self {
            user_prompt_template: user_prompt_template.into(),
            template_variables: Vec::new(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.template_variables.push(name.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One stage of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    /// 1-based position; equals array position + 1.
    pub index: u32,
    pub name: String,
    pub step_type: StepType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Only meaningful on `LLM_PROCESSING` steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_config: Option<LlmConfig>,
}

impl Step {
    /// A step with the conventional `step_{index}` id.
    pub fn new(
        index: u32,
        name: impl Into<String>,
        step_type: StepType,
        description: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Self {
        Self {
            id: format!("step_{index}"),
            index,
            name: name.into(),
            step_type,
            description: description.into(),
            parameters,
            llm_config: None,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowSchema
// ---------------------------------------------------------------------------

fn default_version() -> String {
    DEFAULT_VERSION.to_owned()
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSchema {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub steps: Vec<Step>,
}

impl WorkflowSchema {
    /// Build a schema whose id is the slug of `name`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        steps: Vec<Step>,
    ) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            description: description.into(),
            category: category.into(),
            version: default_version(),
            steps,
        }
    }

    pub fn step(&self, index: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugify_collapses_and_trims_separators() {
        assert_eq!(slugify("Hello Workflow"), "hello_workflow");
        assert_eq!(slugify("  Data -- Processing Pipeline!! "), "data_processing_pipeline");
        assert_eq!(slugify("Report"), "report");
        assert_eq!(slugify("report!"), "report");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn title_case_capitalises_each_word() {
        assert_eq!(title_case("user name input"), "User Name Input");
        assert_eq!(title_case("ai-powered data analysis"), "Ai-Powered Data Analysis");
        assert_eq!(title_case("  LOUD  "), "Loud");
    }

    #[test]
    fn schema_round_trips_through_json() {
        let schema = WorkflowSchema::new(
            "Round Trip",
            "",
            "demo",
            vec![Step::new(
                1,
                "Pick",
                StepType::FormInput,
                "Execute pick",
                vec![
                    Parameter::new("mode", ParameterType::Select)
                        .required()
                        .with_options(["fast", "slow"])
                        .with_default(json!("fast")),
                    Parameter::new("speed", ParameterType::Number)
                        .with_rule(ValidationRule::Min { value: 1.0, message: None })
                        .visible_when(VisibleWhen {
                            step: None,
                            parameter: "mode".into(),
                            condition: VisibilityCondition::Equals { value: json!("fast") },
                        }),
                ],
            )],
        );

        let text = serde_json::to_string_pretty(&schema).unwrap();
        let back: WorkflowSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn missing_version_defaults() {
        let schema: WorkflowSchema = serde_json::from_value(json!({
            "id": "x", "name": "X", "category": "c", "steps": []
        }))
        .unwrap();
        assert_eq!(schema.version, DEFAULT_VERSION);
        assert_eq!(schema.description, "");
    }

    #[test]
    fn display_label_falls_back_to_name() {
        let p = Parameter::new("llm_provider", ParameterType::Select);
        assert_eq!(p.display_label(), "Llm Provider");
        assert_eq!(p.with_label("Provider").display_label(), "Provider");
    }

    #[test]
    fn llm_config_fills_defaults_and_omits_unset_fields() {
        let step: Step = serde_json::from_value(json!({
            "id": "step_1", "index": 1, "name": "Ask", "step_type": "LLM_PROCESSING",
            "llm_config": { "user_prompt_template": "Summarise {input_data}", "max_tokens": 200 }
        }))
        .unwrap();
        let config = step.llm_config.as_ref().unwrap();
        assert_eq!(config.response_format, ResponseFormat::Text);
        assert_eq!(config.max_tokens, Some(200));
        assert!(config.template_variables.is_empty());

        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(
            value["llm_config"],
            json!({ "user_prompt_template": "Summarise {input_data}", "max_tokens": 200, "response_format": "text" })
        );
        let plain = serde_json::to_value(Step::new(2, "Show", StepType::FormInput, "", vec![])).unwrap();
        assert!(plain.get("llm_config").is_none());
    }

    #[test]
    fn type_names_serialize_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&ParameterType::TextArea).unwrap(),
            "\"TEXT_AREA\""
        );
        assert_eq!(
            serde_json::to_string(&StepType::LlmProcessing).unwrap(),
            "\"LLM_PROCESSING\""
        );
        assert_eq!(ParameterType::Multiselect.to_string(), "MULTISELECT");
    }
}
