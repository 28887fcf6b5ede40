//! Toolpipe MCP - Model Context Protocol client
//!
//! This crate provides the client side of MCP over a process-pipe transport:
//! a spawned tool host speaks newline-delimited JSON-RPC on its stdin/stdout.

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::{ClientInfo, ContentItem, McpClient, McpError, ServerInfo, ToolCallResult};
pub use transport::{StdioTransport, Transport};

use serde::{Deserialize, Serialize};

/// MCP protocol version
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Tool definition in MCP format
///
/// A missing `name` deserializes to an empty string so callers can decide how
/// to treat a malformed catalog entry instead of failing the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

/// Server capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_deserializes_from_wire_format() {
        let tool: McpTool = serde_json::from_value(serde_json::json!({
            "name": "list_directory",
            "description": "List a directory",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }
        }))
        .unwrap();

        assert_eq!(tool.name, "list_directory");
        assert_eq!(tool.description.as_deref(), Some("List a directory"));
        assert_eq!(tool.input_schema["required"][0], "path");
    }

    #[test]
    fn test_tool_missing_fields_use_defaults() {
        let tool: McpTool = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(tool.name.is_empty());
        assert!(tool.description.is_none());
        assert_eq!(tool.input_schema, serde_json::json!({ "type": "object" }));
    }

    #[test]
    fn test_capabilities_tolerate_unknown_shapes() {
        let caps: ServerCapabilities = serde_json::from_value(serde_json::json!({
            "tools": {},
            "logging": {}
        }))
        .unwrap();
        assert!(caps.tools.is_some());
        assert!(!caps.tools.unwrap().list_changed);
        assert!(caps.resources.is_none());
    }
}
