//! Schema validation: run this before generating anything.
//!
//! Rules enforced:
//! 1. The name is non-empty and the id is its slug.
//! 2. The id is not already taken.
//! 3. There is at least one step; indices run 1..=n in order; step ids are unique.
//! 4. Parameter names are unique within a step.
//! 5. Choice parameters carry options, and their defaults are among them;
//!    other defaults have the JSON shape of the parameter type.
//! 6. Rules fit the parameter type; bounds are finite and ordered.
//! 7. Visibility references point at an earlier parameter.
//! 8. An LLM configuration sits on an LLM step and reads that step's parameters.
//!
//! Validation is pure: it never touches storage or the registries.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::SchemaValidationError;
use crate::models::{
    slugify, Parameter, ParameterType, Step, StepType, ValidationRule, WorkflowSchema,
};
use crate::render::types::{type_mapping, Bounds};

/// Validate `schema` against its own structure and the ids already in use.
///
/// # Errors
/// The first violation found, as a [`SchemaValidationError`] whose
/// `field_path` points at the offending field.
pub fn validate_schema(
    schema: &WorkflowSchema,
    existing_ids: &HashSet<String>,
) -> Result<(), SchemaValidationError> {
    let fail = |path: String, reason: String| SchemaValidationError::new(&schema.id, path, reason);

    // -----------------------------------------------------------------------
    // 1–2. Identity
    // -----------------------------------------------------------------------
    if schema.name.trim().is_empty() {
        return Err(fail("name".into(), "must not be empty".into()));
    }
    let slug = slugify(&schema.name);
    if slug.is_empty() {
        return Err(fail(
            "name".into(),
            format!("'{}' does not produce a usable id", schema.name),
        ));
    }
    if schema.id != slug {
        return Err(fail(
            "id".into(),
            format!("must be '{slug}', the slug of the name"),
        ));
    }
    if existing_ids.contains(&schema.id) {
        return Err(fail(
            "id".into(),
            format!("'{}' is already in use", schema.id),
        ));
    }

    // -----------------------------------------------------------------------
    // 3. Steps
    // -----------------------------------------------------------------------
    if schema.steps.is_empty() {
        return Err(fail("steps".into(), "at least one step is required".into()));
    }
    let mut step_ids: HashSet<&str> = HashSet::new();
    for (position, step) in schema.steps.iter().enumerate() {
        let expected = position as u32 + 1;
        if step.index != expected {
            return Err(fail(
                format!("steps[{expected}].index"),
                format!("is {} but must be {expected}", step.index),
            ));
        }
        if step.id.trim().is_empty() {
            return Err(fail(format!("steps[{expected}].id"), "must not be empty".into()));
        }
        if !step_ids.insert(step.id.as_str()) {
            return Err(fail(
                format!("steps[{expected}].id"),
                format!("duplicate step id '{}'", step.id),
            ));
        }
        if step.name.trim().is_empty() {
            return Err(fail(format!("steps[{expected}].name"), "must not be empty".into()));
        }
        validate_parameters(schema, step).map_err(|(path, reason)| fail(path, reason))?;
        validate_llm_config(step).map_err(|(path, reason)| fail(path, reason))?;
    }

    Ok(())
}

/// Checks 4–7 for one step; errors are `(field_path, reason)`.
fn validate_parameters(schema: &WorkflowSchema, step: &Step) -> Result<(), (String, String)> {
    let mut names: HashSet<&str> = HashSet::new();

    for (position, param) in step.parameters.iter().enumerate() {
        let path = format!("steps[{}].parameters[{}]", step.index, position);

        if param.name.trim().is_empty() {
            return Err((format!("{path}.name"), "must not be empty".into()));
        }
        if !names.insert(param.name.as_str()) {
            return Err((
                format!("{path}.name"),
                format!("duplicate parameter name '{}'", param.name),
            ));
        }

        if param.param_type.is_choice() {
            check_options(param).map_err(|reason| (format!("{path}.options"), reason))?;
            check_choice_default(param).map_err(|reason| (format!("{path}.default"), reason))?;
        } else {
            check_default(param).map_err(|reason| (format!("{path}.default"), reason))?;
        }

        for (i, rule) in param.validation.iter().enumerate() {
            check_rule(param.param_type, rule)
                .map_err(|reason| (format!("{path}.validation[{i}]"), reason))?;
        }
        check_bounds_order(param).map_err(|reason| (format!("{path}.validation"), reason))?;

        if let Some(rule) = &param.visible_when {
            let target = match rule.step {
                None => step.parameters[..position]
                    .iter()
                    .any(|p| p.name == rule.parameter),
                Some(index) if index == step.index => step.parameters[..position]
                    .iter()
                    .any(|p| p.name == rule.parameter),
                Some(index) if index < step.index => schema
                    .step(index)
                    .map(|s| s.parameters.iter().any(|p| p.name == rule.parameter))
                    .unwrap_or(false),
                Some(_) => false,
            };
            if !target {
                return Err((
                    format!("{path}.visible_when"),
                    format!(
                        "'{}' is not a parameter defined earlier than '{}'",
                        rule.parameter, param.name
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Check 8 for one step.
fn validate_llm_config(step: &Step) -> Result<(), (String, String)> {
    let Some(config) = &step.llm_config else {
        return Ok(());
    };
    let path = format!("steps[{}].llm_config", step.index);

    if step.step_type != StepType::LlmProcessing {
        return Err((path, format!("not allowed on a {} step", step.step_type)));
    }
    if config.user_prompt_template.trim().is_empty() {
        return Err((format!("{path}.user_prompt_template"), "must not be empty".into()));
    }
    for (i, var) in config.template_variables.iter().enumerate() {
        if !step.parameters.iter().any(|p| p.name == *var) {
            return Err((
                format!("{path}.template_variables[{i}]"),
                format!("'{var}' is not a parameter of this step"),
            ));
        }
    }
    if config.max_tokens == Some(0) {
        return Err((format!("{path}.max_tokens"), "must be positive".into()));
    }
    if let Some(t) = config.temperature {
        if !t.is_finite() || !(0.0..=2.0).contains(&t) {
            return Err((format!("{path}.temperature"), format!("{t} is outside 0..=2")));
        }
    }
    Ok(())
}

fn check_default(param: &Parameter) -> Result<(), String> {
    match &param.default {
        None | Some(Value::Null) => Ok(()),
        Some(v) if type_mapping(param.param_type).default.accepts(v) => Ok(()),
        Some(v) => Err(format!("default {v} does not fit a {} parameter", param.param_type)),
    }
}

fn check_options(param: &Parameter) -> Result<(), String> {
    if param.options.is_empty() {
        return Err(format!("{} parameter needs at least one option", param.param_type));
    }
    let mut seen = HashSet::new();
    for option in &param.options {
        if option.is_empty() {
            return Err("options must not be empty strings".into());
        }
        if !seen.insert(option.as_str()) {
            return Err(format!("duplicate option '{option}'"));
        }
    }
    Ok(())
}

fn check_choice_default(param: &Parameter) -> Result<(), String> {
    let in_options = |v: &Value| {
        v.as_str()
            .map(|s| param.options.iter().any(|o| o == s))
            .unwrap_or(false)
    };
    match (&param.default, param.param_type) {
        (None, _) | (Some(Value::Null), _) => Ok(()),
        (Some(v), ParameterType::Select) if in_options(v) => Ok(()),
        (Some(Value::Array(items)), ParameterType::Multiselect) if items.iter().all(in_options) => {
            Ok(())
        }
        (Some(v), _) => Err(format!("default {v} is not among the options")),
    }
}

fn check_rule(ty: ParameterType, rule: &ValidationRule) -> Result<(), String> {
    let mapping = type_mapping(ty);
    match rule {
        ValidationRule::Required { .. } => Ok(()),
        ValidationRule::Min { value, .. } | ValidationRule::Max { value, .. } => {
            if !value.is_finite() {
                return Err("bound must be a finite number".into());
            }
            match mapping.bounds {
                Bounds::Value => Ok(()),
                Bounds::Length if *value >= 0.0 && value.fract() == 0.0 => Ok(()),
                Bounds::Length => Err("length bound must be a non-negative whole number".into()),
                Bounds::Unsupported => Err(format!("{ty} parameters take no min/max rule")),
            }
        }
        ValidationRule::Pattern { pattern, .. } => {
            if !mapping.pattern {
                Err(format!("{ty} parameters take no pattern rule"))
            } else if pattern.is_empty() {
                Err("pattern must not be empty".into())
            } else {
                Ok(())
            }
        }
    }
}

fn check_bounds_order(param: &Parameter) -> Result<(), String> {
    let bound = |pick: fn(&ValidationRule) -> Option<f64>| {
        param.validation.iter().filter_map(pick).next()
    };
    let min = bound(|r| match r {
        ValidationRule::Min { value, .. } => Some(*value),
        _ => None,
    });
    let max = bound(|r| match r {
        ValidationRule::Max { value, .. } => Some(*value),
        _ => None,
    });
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Err(format!("min {lo} exceeds max {hi}")),
        _ => Ok(()),
    }
}
