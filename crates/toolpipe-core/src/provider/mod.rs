//! Completion API abstraction
//!
//! The agent loop talks to the model through [`CompletionClient`]; the one
//! shipped implementation speaks the OpenAI-compatible chat completions API.

mod logging;
mod openai;

pub use logging::{log_file_from_env, log_llm_interaction, LogEntry, LLM_LOG_FILE_ENV};
pub use openai::{normalize_base_url, OpenAiClient, DEFAULT_BASE_URL};

use async_trait::async_trait;

use crate::error::Result;
use crate::orchestration::FunctionSpec;
use crate::session::{ToolCallRequest, Turn};

/// One completion request
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Full transcript, system turn first
    pub messages: &'a [Turn],
    /// Functions offered to the model; `None` means the model must answer in text
    pub tools: Option<&'a [FunctionSpec]>,
    pub max_tokens: u32,
}

/// What the model answered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The assistant turn recording this reply
    pub fn into_turn(self) -> Turn {
        Turn::assistant_with_calls(self.content, self.tool_calls)
    }
}

/// A chat completion endpoint with function calling
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier sent with every request
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantReply>;
}
