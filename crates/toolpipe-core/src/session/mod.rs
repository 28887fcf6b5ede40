//! Session module - conversation state, the per-query agent loop and the
//! session that ties them to a tool server
//!
//! ```text
//!   ToolSession ──owns──▶ McpClient ──stdio──▶ tool server
//!       │
//!       ├── Conversation (system, user, assistant, tool turns)
//!       │
//!       └── process_query ──▶ AgentLoop ──▶ CompletionClient
//!                                  └──────▶ ToolExecutor ──▶ McpClient
//! ```

mod agent_loop;
mod conversation;
mod lifecycle;

pub use agent_loop::{AgentLoop, LoopSettings, QueryAnswer};
pub use conversation::{check_turns, Conversation, InvariantViolation, Role, ToolCallRequest, Turn};
pub use lifecycle::{ServerLaunch, ToolSession};
