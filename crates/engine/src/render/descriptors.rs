//! The two JSON descriptors written next to the code artifacts.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::models::WorkflowSchema;

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub step_count: usize,
}

impl From<&WorkflowSchema> for ConfigDescriptor {
    fn from(schema: &WorkflowSchema) -> Self {
        Self {
            id: schema.id.clone(),
            name: schema.name.clone(),
            description: schema.description.clone(),
            category: schema.category.clone(),
            step_count: schema.steps.len(),
        }
    }
}

fn pretty<T: Serialize>(schema: &WorkflowSchema, what: &str, value: &T) -> Result<String, RenderError> {
    serde_json::to_string_pretty(value)
        .map(|mut text| {
            text.push('\n');
            text
        })
        .map_err(|e| RenderError::new(&schema.id, what, e.to_string()))
}

pub fn config_descriptor(schema: &WorkflowSchema) -> Result<String, RenderError> {
    pretty(schema, "config", &ConfigDescriptor::from(schema))
}

pub fn schema_descriptor(schema: &WorkflowSchema) -> Result<String, RenderError> {
    pretty(schema, "schema", schema)
}

/// Parse a schema descriptor back into the schema it was rendered from.
pub fn parse_schema_descriptor(text: &str) -> Result<WorkflowSchema, serde_json::Error> {
    serde_json::from_str(text)
}
