//! Conversation state
//!
//! An ordered list of turns. Tool turns must answer a tool call issued by an
//! earlier assistant turn that is still unanswered, so turns are only ever added as whole
//! query transcripts through [`Conversation::append_all`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A tool call proposed by the model
///
/// `arguments` is kept exactly as the model produced it; it is parsed only
/// when the call is executed and echoed back verbatim on later requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// One entry of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Turn::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Turn::User { content: content.into() }
    }

    /// Plain assistant reply without tool calls
    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant turn that issues tool calls
    pub fn assistant_with_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Turn::Assistant { content, tool_calls }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Turn::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Turn::System { .. } => Role::System,
            Turn::User { .. } => Role::User,
            Turn::Assistant { .. } => Role::Assistant,
            Turn::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            Turn::System { content } | Turn::User { content } | Turn::Tool { content, .. } => {
                Some(content.as_str())
            }
            Turn::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Tool calls issued by this turn (empty for non-assistant turns)
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Turn::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Ways a turn sequence can break the pairing rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("tool turn at index {index} answers unknown call id {call_id}")]
    UnmatchedToolTurn { index: usize, call_id: String },

    #[error("tool call id {call_id} answered twice (second at index {index})")]
    DuplicateCallId { index: usize, call_id: String },
}

/// Check that every tool turn answers an earlier, still unanswered call
///
/// Ids only need to be unique among pending calls: servers that number calls
/// per reply (`call_0`, ...) or omit them entirely reuse the same id across
/// assistant turns, and one reply may carry several calls with an empty id.
pub fn check_turns(turns: &[Turn]) -> Result<(), InvariantViolation> {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut issued: HashSet<&str> = HashSet::new();

    for (index, turn) in turns.iter().enumerate() {
        match turn {
            Turn::Assistant { tool_calls, .. } => {
                for call in tool_calls {
                    *pending.entry(call.id.as_str()).or_default() += 1;
                    issued.insert(call.id.as_str());
                }
            }
            Turn::Tool { tool_call_id, .. } => {
                let id = tool_call_id.as_str();
                match pending.get_mut(id) {
                    Some(open) if *open > 0 => *open -= 1,
                    _ if issued.contains(id) => {
                        return Err(InvariantViolation::DuplicateCallId {
                            index,
                            call_id: tool_call_id.clone(),
                        });
                    }
                    _ => {
                        return Err(InvariantViolation::UnmatchedToolTurn {
                            index,
                            call_id: tool_call_id.clone(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Session-lifetime conversation
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation seeded with a system turn
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(prompt)],
        }
    }

    /// Append a single turn
    ///
    /// Only system and user turns may be appended on their own; anything
    /// involving tool calls goes through [`Conversation::append_all`].
    pub fn append(&mut self, turn: Turn) {
        debug_assert!(
            matches!(turn, Turn::System { .. } | Turn::User { .. }),
            "tool-bearing turns must be appended as a batch"
        );
        self.turns.push(turn);
    }

    /// Append a whole query transcript in one step
    pub fn append_all(&mut self, turns: Vec<Turn>) {
        self.turns.extend(turns);
        debug_assert!(self.check_invariant().is_ok(), "conversation pairing broken");
    }

    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn check_invariant(&self) -> Result<(), InvariantViolation> {
        check_turns(&self.turns)
    }
}
