//! Tool registry adapter
//!
//! Converts the catalog a tool host declares into the function-calling schema
//! the completion API expects.

use serde::Serialize;
use serde_json::{json, Value};
use toolpipe_mcp::McpTool;

use crate::error::{Error, Result};

/// A function the model may call, as offered to the completion API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionSpec {
    /// OpenAI `tools[]` entry: `{"type": "function", "function": {...}}`
    pub fn to_tool_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Adapt a tool catalog, preserving its order
///
/// A descriptor without a name makes the whole catalog unusable; the model
/// could never address that tool, so this fails instead of skipping it.
pub fn adapt(catalog: &[McpTool]) -> Result<Vec<FunctionSpec>> {
    catalog
        .iter()
        .enumerate()
        .map(|(index, tool)| adapt_one(index, tool))
        .collect()
}

fn adapt_one(index: usize, tool: &McpTool) -> Result<FunctionSpec> {
    let name = tool.name.trim();
    if name.is_empty() {
        return Err(Error::Catalog(format!(
            "tool #{} in the catalog has no name",
            index
        )));
    }

    let description = match tool.description.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => format!("Tool for {}", name),
    };

    Ok(FunctionSpec {
        name: name.to_string(),
        description,
        parameters: tool.input_schema.clone(),
    })
}
