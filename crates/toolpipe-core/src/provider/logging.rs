//! LLM request/response logging
//!
//! Set `LLM_LOG_FILE` to append one JSON object per completion round to that
//! file. The variable is read when a client is created.
//! Example: `LLM_LOG_FILE=/tmp/llm.log toolpipe server.py`

use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::AssistantReply;

pub const LLM_LOG_FILE_ENV: &str = "LLM_LOG_FILE";

/// What to record for one round
#[derive(Default)]
pub struct LogEntry<'a> {
    pub model: &'a str,
    /// Request body exactly as sent
    pub request: Option<&'a Value>,
    pub reply: Option<&'a AssistantReply>,
    /// Response body when it could not be parsed
    pub raw_response: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Log destination named by `LLM_LOG_FILE`, if set
pub fn log_file_from_env() -> Option<PathBuf> {
    std::env::var_os(LLM_LOG_FILE_ENV)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Append an interaction to the log file
pub fn log_llm_interaction(log_file: &Path, entry: LogEntry<'_>) {
    let line = render(&entry);

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
    {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!("Failed to write to LLM log file: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to open LLM log file {}: {}", log_file.display(), e);
        }
    }

    debug!("Logged LLM interaction to {}", log_file.display());
}

fn render(entry: &LogEntry<'_>) -> String {
    let value = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model": entry.model,
        "request": entry.request,
        "response": {
            "parsed": entry.reply.map(|r| json!({
                "type": if r.has_tool_calls() { "tool_calls" } else { "message" },
                "content": r.content,
                "tool_calls": r.tool_calls.iter().map(|c| json!({
                    "id": c.id,
                    "name": c.name,
                    "arguments": c.arguments,
                })).collect::<Vec<_>>(),
            })),
            "raw": entry.raw_response,
        },
        "error": entry.error,
    });
    serde_json::to_string(&value).unwrap_or_default()
}
