//! Orchestration building blocks shared by the agent loop
//!
//! - System prompt construction
//! - Tool catalog adaptation
//! - Tool call execution and result normalization

mod executor;
mod system_prompt;
mod tool_registry;
mod tool_result;

pub use executor::{parse_arguments, ExecutionOutcome, ToolExecutor, ToolHost};
pub use system_prompt::{SystemPrompt, DEFAULT_SYSTEM_PROMPT};
pub use tool_registry::{adapt, FunctionSpec};
pub use tool_result::normalize_tool_result;
