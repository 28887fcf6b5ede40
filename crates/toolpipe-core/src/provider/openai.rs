//! OpenAI-compatible chat completions client

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::logging::{log_file_from_env, log_llm_interaction, LogEntry};
use super::{AssistantReply, CompletionClient, CompletionRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{ToolCallRequest, Turn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for any endpoint speaking the OpenAI chat completions API
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
    log_file: Option<PathBuf>,
}

impl OpenAiClient {
    /// Create a client; `api_key` may be omitted for local endpoints
    pub fn new(api_key: Option<&str>, model: impl Into<String>, base_url: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| Error::Config(format!("Invalid API key: {}", e)))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("toolpipe/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model: model.into(),
            base_url: normalize_base_url(base_url),
            log_file: log_file_from_env(),
        })
    }

    /// Record every completion round to `path` instead of `LLM_LOG_FILE`
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_key(), config.model.clone(), config.base_url.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages.iter().map(turn_to_wire).collect::<Vec<_>>(),
            "max_tokens": request.max_tokens,
        });

        if let Some(tools) = request.tools.filter(|t| !t.is_empty()) {
            body["tools"] = Value::Array(tools.iter().map(|t| t.to_tool_json()).collect());
        }
        body
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantReply> {
        let body = self.request_body(&request);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.map(|t| t.len()).unwrap_or(0),
            "Sending completion request"
        );

        let (outcome, raw) = match self.send(&body).await {
            Ok(text) => (parse_reply(&text), Some(text)),
            Err(e) => (Err(e), None),
        };

        if let Some(log_file) = &self.log_file {
            let error = outcome.as_ref().err().map(ToString::to_string);
            log_llm_interaction(
                log_file,
                LogEntry {
                    model: &self.model,
                    request: Some(&body),
                    reply: outcome.as_ref().ok(),
                    // Raw body only when it did not parse into a reply
                    raw_response: raw.as_deref().filter(|_| outcome.is_err()),
                    error: error.as_deref(),
                },
            );
        }

        outcome
    }
}

impl OpenAiClient {
    /// POST the request, returning the body of a successful response
    async fn send(&self, body: &Value) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Completion request failed: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read completion response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Provider(format!("{} {}", status, text)));
        }

        Ok(text)
    }
}

/// Turn in the chat completions wire format
fn turn_to_wire(turn: &Turn) -> Value {
    match turn {
        Turn::System { content } => json!({ "role": "system", "content": content }),
        Turn::User { content } => json!({ "role": "user", "content": content }),
        Turn::Assistant { content, tool_calls } => {
            let mut out = Map::new();
            out.insert("role".to_string(), Value::String("assistant".to_string()));
            out.insert(
                "content".to_string(),
                content.clone().map(Value::String).unwrap_or(Value::Null),
            );
            if !tool_calls.is_empty() {
                let calls = tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": { "name": c.name, "arguments": c.arguments }
                        })
                    })
                    .collect();
                out.insert("tool_calls".to_string(), Value::Array(calls));
            }
            Value::Object(out)
        }
        Turn::Tool { tool_call_id, content } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn parse_reply(text: &str) -> Result<AssistantReply> {
    let parsed: ChatResponse = serde_json::from_str(text)
        .map_err(|e| Error::Provider(format!("Malformed completion response: {}", e)))?;

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| Error::Provider("Completion response has no choices".to_string()))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallRequest {
            id: tc.id,
            name: tc.function.name,
            arguments: raw_arguments(tc.function.arguments),
        })
        .collect();

    Ok(AssistantReply {
        content: message.content,
        tool_calls,
    })
}

/// Arguments as the raw string the model produced
///
/// Some compatible servers send an already-decoded object; that is
/// re-serialized so the executor sees one representation.
fn raw_arguments(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Normalize a user-supplied base URL
pub fn normalize_base_url(base_url: Option<&str>) -> String {
    let Some(base) = base_url.map(str::trim).filter(|b| !b.is_empty()) else {
        return DEFAULT_BASE_URL.to_string();
    };

    // Users sometimes paste the full endpoint.
    let base = base.trim_end_matches('/');
    let base = base.strip_suffix("/chat/completions").unwrap_or(base);
    let base = base.trim_end_matches('/');

    match url::Url::parse(base) {
        Ok(url) if url.path().is_empty() || url.path() == "/" => format!("{}/v1", base),
        _ => base.to_string(),
    }
}
