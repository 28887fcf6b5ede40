//! Tool result formatting
//!
//! Flattens whatever the tool host returned into the text sent back to the model.

use toolpipe_mcp::ToolCallResult;

/// Normalize a tool result to a single text blob
///
/// Text parts contribute their text, other parts their JSON form, joined by
/// newlines. A result without a content list is stringified whole.
pub fn normalize_tool_result(result: &ToolCallResult) -> String {
    if result.content.is_empty() {
        return serde_json::to_string(result).unwrap_or_default();
    }

    result
        .content
        .iter()
        .map(|part| match (part.content_type.as_str(), &part.text) {
            ("text", Some(text)) => text.clone(),
            _ => serde_json::to_string(part).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
