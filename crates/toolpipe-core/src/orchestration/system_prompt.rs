//! System prompt management
//!
//! The system turn is seeded once per session, before the first query.

/// System prompt configuration and generation
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    /// Base system prompt
    base: String,
    /// Additional context (e.g., server name)
    context: Option<String>,
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPrompt {
    /// Create a new system prompt with the default content
    pub fn new() -> Self {
        Self {
            base: DEFAULT_SYSTEM_PROMPT.to_string(),
            context: None,
        }
    }

    /// Create with custom base prompt
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            context: None,
        }
    }

    /// Mention the connected tool host and its tools
    pub fn with_server_context(mut self, server_name: &str, tool_names: &[&str]) -> Self {
        let context = format!(
            "\n\n## Connected Tool Server\n{} ({} tools: {})",
            server_name,
            tool_names.len(),
            tool_names.join(", ")
        );
        self.context = Some(context);
        self
    }

    /// Build the final system prompt
    pub fn build(&self) -> String {
        match &self.context {
            Some(ctx) => format!("{}{}", self.base, ctx),
            None => self.base.clone(),
        }
    }
}

/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant with access to tools provided by a connected tool server.

IMPORTANT: When calling tools, you MUST provide arguments as a JSON object with the parameter names from the tool's schema.

For example:
- To read a file: {"path": "/path/to/file.txt"}
- To list a directory: {"path": "/path/to/directory"}
- To write a file: {"path": "/path/to/file.txt", "content": "file content"}

NEVER pass arguments as bare strings. If a tool result starts with "Error", read it, correct your arguments and try again or explain the problem to the user."#;
