//! MCP data structures exchanged during `initialize`, `tools/list` and `tools/call`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Serialize, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ServerCapabilities {
    pub tools: Map<String, Value>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

#[derive(Debug, Serialize, Clone)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, ToolProperty>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ToolInputSchema {
    pub fn object(
        properties: impl IntoIterator<Item = (&'static str, ToolProperty)>,
        required: &[&str],
    ) -> Self {
        ToolInputSchema {
            schema_type: "object".into(),
            properties: properties
                .into_iter()
                .map(|(name, property)| (name.to_string(), property))
                .collect(),
            required: required.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ToolProperty {
    #[serde(rename = "type")]
    pub property_type: String,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolProperty {
    fn new(property_type: &str, description: &str) -> Self {
        ToolProperty {
            property_type: property_type.into(),
            description: description.into(),
            allowed: None,
            default: None,
        }
    }

    pub fn string(description: &str) -> Self {
        Self::new("string", description)
    }

    pub fn integer(description: &str) -> Self {
        Self::new("integer", description)
    }

    pub fn boolean(description: &str, default: bool) -> Self {
        ToolProperty {
            default: Some(Value::Bool(default)),
            ..Self::new("boolean", description)
        }
    }

    pub fn one_of(description: &str, allowed: &[&str]) -> Self {
        ToolProperty {
            allowed: Some(allowed.iter().map(|value| value.to_string()).collect()),
            ..Self::new("string", description)
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn new(text: impl Into<String>, is_error: bool) -> Self {
        ToolResponse {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error,
        }
    }

    /// Pretty-printed JSON as a single text block.
    pub fn json(value: &Value) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_string_pretty(value)?, false))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, true)
    }

    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }
}
