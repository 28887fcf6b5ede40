//! Session lifecycle
//!
//! A [`ToolSession`] owns everything one interactive run needs: the channel
//! to the tool server, the completion client, the adapted tool catalog and
//! the conversation. It is opened once, serves queries one at a time and is
//! closed on the way out.

use std::collections::HashMap;
use std::path::Path;

use toolpipe_mcp::{ClientInfo, McpClient, McpTool, ServerInfo, StdioTransport, Transport};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::agent_loop::{AgentLoop, LoopSettings, QueryAnswer};
use super::conversation::Conversation;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::orchestration::{adapt, FunctionSpec, SystemPrompt, ToolExecutor};
use crate::provider::CompletionClient;

/// How to start a tool server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLaunch {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ServerLaunch {
    /// Launch for a `.py` or `.js` server script
    pub fn from_script(path: impl AsRef<Path>, extra_args: &[String], config: &Config) -> Result<Self> {
        let path = path.as_ref();

        let command = match path.extension().and_then(|e| e.to_str()) {
            Some("py") => config.python_command.clone(),
            Some("js") => config.node_command.clone(),
            _ => {
                return Err(Error::Connection(
                    "Server script must be a .py or .js file".to_string(),
                ));
            }
        };

        if !path.is_file() {
            return Err(Error::Connection(format!(
                "Server script not found: {}",
                path.display()
            )));
        }

        let mut args = vec![path.display().to_string()];
        args.extend(extra_args.iter().cloned());

        Ok(Self {
            command,
            args,
            env: config.server_env.clone(),
        })
    }

    pub async fn spawn(&self) -> Result<StdioTransport> {
        StdioTransport::spawn(&self.command, &self.args, &self.env)
            .await
            .map_err(|e| Error::Connection(format!("Failed to start {}: {}", self.command, e)))
    }
}

/// An open session against one tool server
pub struct ToolSession<T: Transport = StdioTransport> {
    id: Uuid,
    client: McpClient<T>,
    llm: Box<dyn CompletionClient>,
    server_info: ServerInfo,
    catalog: Vec<McpTool>,
    functions: Vec<FunctionSpec>,
    executor: ToolExecutor,
    conversation: Conversation,
    settings: LoopSettings,
    refresh_tools_per_query: bool,
    strict_arguments: bool,
}

impl ToolSession<StdioTransport> {
    /// Spawn the server and connect to it
    pub async fn open(
        launch: &ServerLaunch,
        config: &Config,
        llm: Box<dyn CompletionClient>,
    ) -> Result<Self> {
        let transport = launch.spawn().await?;
        if let Some(pid) = transport.pid() {
            debug!(pid, command = %launch.command, "Tool server started");
        }
        Self::connect(transport, config, llm).await
    }
}

impl<T: Transport> ToolSession<T> {
    /// Handshake over an already-open transport and fetch the tool catalog
    ///
    /// On failure the transport is closed before the error is returned.
    pub async fn connect(transport: T, config: &Config, llm: Box<dyn CompletionClient>) -> Result<Self> {
        let mut client = McpClient::new(transport);

        let (server_info, catalog, functions) = match handshake(&mut client).await {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(close_err) = client.close().await {
                    debug!("Failed to close transport after handshake error: {}", close_err);
                }
                return Err(e);
            }
        };

        let id = Uuid::new_v4();
        info!(
            session = %id,
            server = %server_info.name,
            tools = catalog.len(),
            "Connected to tool server"
        );

        let conversation = match config.system_prompt() {
            Some(base) => {
                let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
                let prompt = SystemPrompt::with_base(base)
                    .with_server_context(display_name(&server_info), &names)
                    .build();
                Conversation::with_system_prompt(prompt)
            }
            None => Conversation::new(),
        };

        Ok(Self {
            id,
            executor: ToolExecutor::for_catalog(&catalog, config.strict_arguments),
            client,
            llm,
            server_info,
            catalog,
            functions,
            conversation,
            settings: LoopSettings::from_config(config),
            refresh_tools_per_query: config.refresh_tools_per_query,
            strict_arguments: config.strict_arguments,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Tool catalog as declared by the server
    pub fn tools(&self) -> &[McpTool] {
        &self.catalog
    }

    /// Catalog adapted for the completion API
    pub fn functions(&self) -> &[FunctionSpec] {
        &self.functions
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_connected(&self) -> bool {
        !self.client.is_closed()
    }

    /// Re-fetch and re-adapt the tool catalog
    pub async fn refresh_tools(&mut self) -> Result<()> {
        let catalog = self.client.list_tools().await?;
        let functions = adapt(&catalog)?;

        debug!(session = %self.id, tools = catalog.len(), "Refreshed tool catalog");
        self.executor = ToolExecutor::for_catalog(&catalog, self.strict_arguments);
        self.catalog = catalog;
        self.functions = functions;
        Ok(())
    }

    /// Answer one user query
    pub async fn process_query(&mut self, query: &str) -> Result<QueryAnswer> {
        if !self.is_connected() {
            return Err(Error::Connection(
                "Tool server connection is closed".to_string(),
            ));
        }

        if self.refresh_tools_per_query {
            self.refresh_tools().await?;
        }

        let agent = AgentLoop::new(
            self.llm.as_ref(),
            &self.client,
            &self.executor,
            &self.functions,
            self.settings,
        );
        agent.run(&mut self.conversation, query).await
    }

    /// Release the tool server channel
    pub async fn close(self) -> Result<()> {
        info!(session = %self.id, turns = self.conversation.len(), "Closing session");
        self.client.close().await.map_err(|e| {
            warn!("Error while closing tool server: {}", e);
            Error::from(e)
        })
    }
}

async fn handshake<T: Transport>(
    client: &mut McpClient<T>,
) -> Result<(ServerInfo, Vec<McpTool>, Vec<FunctionSpec>)> {
    let client_info = ClientInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let server_info = client
        .initialize(client_info)
        .await
        .map_err(|e| Error::Connection(format!("MCP handshake failed: {}", e)))?;

    let catalog = client
        .list_tools()
        .await
        .map_err(|e| Error::Connection(format!("Failed to list tools: {}", e)))?;

    let functions = adapt(&catalog)?;
    Ok((server_info, catalog, functions))
}

fn display_name(info: &ServerInfo) -> &str {
    if info.name.is_empty() {
        "tool server"
    } else {
        &info.name
    }
}
