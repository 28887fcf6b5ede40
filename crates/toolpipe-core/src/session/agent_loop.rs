//! Agent Loop - one user query from question to answer
//!
//! Each query runs: user turn, completion with tools offered, the requested
//! tool calls in the order the model emitted them, then a follow-up
//! completion. `max_tool_rounds` bounds how many times the model may ask for
//! tools before it has to answer in text.
//!
//! Turns produced while the query runs are staged and committed to the
//! conversation only once the query finishes. A failed query, or one whose
//! future is dropped, leaves the conversation as it was.

use std::fmt;

use tracing::{debug, info, warn};

use super::conversation::{Conversation, Turn};
use crate::config::{defaults, Config};
use crate::error::{Error, Result};
use crate::orchestration::{FunctionSpec, ToolExecutor, ToolHost};
use crate::provider::{CompletionClient, CompletionRequest};

/// Per-query limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub max_tokens: u32,
    /// Completions that may request tools before the model must answer
    pub max_tool_rounds: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_tokens: defaults::MAX_TOKENS,
            max_tool_rounds: defaults::MAX_TOOL_ROUNDS,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.max_tokens,
            max_tool_rounds: config.max_tool_rounds,
        }
    }
}

/// The answer to one query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryAnswer {
    /// One `[Calling tool ...]` line per executed call, in call order
    pub trace: Vec<String>,
    /// Final assistant text
    pub text: String,
    /// Completions that requested tools
    pub tool_rounds: usize,
}

impl fmt::Display for QueryAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<&str> = self.trace.iter().map(String::as_str).collect();
        if !self.text.is_empty() || lines.is_empty() {
            lines.push(&self.text);
        }
        f.write_str(&lines.join("\n"))
    }
}

/// Runs queries against a completion client and a tool host
pub struct AgentLoop<'a> {
    llm: &'a dyn CompletionClient,
    host: &'a dyn ToolHost,
    executor: &'a ToolExecutor,
    functions: &'a [FunctionSpec],
    settings: LoopSettings,
}

impl<'a> AgentLoop<'a> {
    pub fn new(
        llm: &'a dyn CompletionClient,
        host: &'a dyn ToolHost,
        executor: &'a ToolExecutor,
        functions: &'a [FunctionSpec],
        settings: LoopSettings,
    ) -> Self {
        Self {
            llm,
            host,
            executor,
            functions,
            settings,
        }
    }

    /// Run one query to completion
    pub async fn run(&self, conversation: &mut Conversation, query: &str) -> Result<QueryAnswer> {
        let mut staged = vec![Turn::user(query)];
        let mut trace = Vec::new();
        let mut rounds = 0;

        loop {
            let offer_tools = rounds < self.settings.max_tool_rounds && !self.functions.is_empty();

            let transcript: Vec<Turn> = conversation
                .snapshot()
                .iter()
                .chain(staged.iter())
                .cloned()
                .collect();

            debug!(
                model = self.llm.model(),
                round = rounds,
                offer_tools,
                turns = transcript.len(),
                "Requesting completion"
            );
            let reply = self
                .llm
                .complete(CompletionRequest {
                    messages: &transcript,
                    tools: offer_tools.then_some(self.functions),
                    max_tokens: self.settings.max_tokens,
                })
                .await?;

            if !reply.has_tool_calls() || !offer_tools {
                if reply.has_tool_calls() {
                    warn!(
                        ignored = reply.tool_calls.len(),
                        rounds,
                        "Tool round limit reached; ignoring further tool calls"
                    );
                }

                let text = reply.content.unwrap_or_default();
                if !text.is_empty() {
                    staged.push(Turn::assistant(text.clone()));
                }
                conversation.append_all(staged);

                info!(tool_rounds = rounds, tool_calls = trace.len(), "Query complete");
                return Ok(QueryAnswer {
                    trace,
                    text,
                    tool_rounds: rounds,
                });
            }

            rounds += 1;
            let calls = reply.tool_calls.clone();
            debug!(round = rounds, calls = calls.len(), "Model requested tools");
            staged.push(reply.into_turn());

            for call in &calls {
                trace.push(format!("[Calling tool {} with args {}]", call.name, call.arguments));

                let outcome = self.executor.execute(self.host, call).await;
                if !outcome.is_success() {
                    info!(tool = %call.name, kind = outcome.kind(), "Tool call failed: {}", outcome.content());
                }
                staged.push(Turn::tool(call.id.clone(), outcome.into_content()));

                if !self.host.is_connected() {
                    return Err(Error::Connection(
                        "Tool server closed the connection".to_string(),
                    ));
                }
            }
        }
    }
}
