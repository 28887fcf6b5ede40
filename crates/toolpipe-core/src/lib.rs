//! Toolpipe Core - LLM and MCP tool orchestration
//!
//! This crate connects a chat completion API to the tools of an MCP server:
//! - Tool catalog adaptation to function-calling specs
//! - Conversation state with tool call pairing
//! - Tool call execution with structured outcomes
//! - The per-query agent loop and session lifecycle

pub mod config;
pub mod error;
pub mod orchestration;
pub mod provider;
pub mod session;

pub use config::{defaults, env_vars, Config, ConfigManager};
pub use error::{Error, Result};

// Orchestration exports
pub use orchestration::{
    adapt, normalize_tool_result, ExecutionOutcome, FunctionSpec, SystemPrompt, ToolExecutor,
    ToolHost,
};

// Provider exports
pub use provider::{AssistantReply, CompletionClient, CompletionRequest, OpenAiClient};

// Session exports
pub use session::{
    AgentLoop, Conversation, LoopSettings, QueryAnswer, Role, ServerLaunch, ToolCallRequest,
    ToolSession, Turn,
};
