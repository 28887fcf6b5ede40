//! MCP Client implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::protocol::{
    error_codes, methods, Incoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use crate::transport::Transport;
use crate::{McpTool, ServerCapabilities, PROTOCOL_VERSION};

/// MCP Client for connecting to MCP servers
pub struct McpClient<T: Transport> {
    transport: Arc<Mutex<T>>,
    request_id: AtomicI64,
    server_capabilities: Option<ServerCapabilities>,
    closed: AtomicBool,
}

impl<T: Transport> McpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            request_id: AtomicI64::new(1),
            server_capabilities: None,
            closed: AtomicBool::new(false),
        }
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Whether the channel to the server has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Capabilities reported by the server during `initialize`
    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Initialize the connection
    pub async fn initialize(&mut self, client_info: ClientInfo) -> Result<ServerInfo, McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_info.name,
                "version": client_info.version
            }
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::INITIALIZE).with_params(params);
        let result = self.request_result(request).await?;

        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

        if init.protocol_version != PROTOCOL_VERSION {
            debug!(
                server_version = %init.protocol_version,
                client_version = PROTOCOL_VERSION,
                "Server negotiated a different protocol version"
            );
        }
        self.server_capabilities = Some(init.capabilities);

        self.notify(JsonRpcNotification::new(methods::INITIALIZED)).await?;

        Ok(ServerInfo {
            name: init.server_info.name,
            version: init.server_info.version,
            protocol_version: init.protocol_version,
        })
    }

    /// List available tools, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_LIST);
            if let Some(c) = cursor.take() {
                request = request.with_params(serde_json::json!({ "cursor": c }));
            }

            let result = self.request_result(request).await?;
            let page: ToolsListResult =
                serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Call a tool
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_CALL).with_params(params);
        let result = self.request_result(request).await?;

        serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<(), McpError> {
        self.closed.store(true, Ordering::SeqCst);
        let mut transport = self.transport.lock().await;
        transport
            .close()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    async fn request_result(&self, request: JsonRpcRequest) -> Result<serde_json::Value, McpError> {
        let response = self.send_request(request).await?;

        if let Some(error) = response.error {
            Err(McpError::Server {
                code: error.code,
                message: error.message,
            })
        } else if let Some(result) = response.result {
            Ok(result)
        } else {
            Err(McpError::Protocol("Empty response".to_string()))
        }
    }

    async fn notify(&self, notification: JsonRpcNotification) -> Result<(), McpError> {
        let value = serde_json::to_value(&notification).map_err(|e| McpError::Protocol(e.to_string()))?;
        let mut transport = self.transport.lock().await;
        self.write(&mut *transport, value).await
    }

    async fn write(&self, transport: &mut T, value: serde_json::Value) -> Result<(), McpError> {
        transport.send(value).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                self.closed.store(true, Ordering::SeqCst);
                McpError::Closed
            } else {
                McpError::Transport(e.to_string())
            }
        })
    }

    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        if self.is_closed() {
            return Err(McpError::Closed);
        }

        let mut transport = self.transport.lock().await;
        let expected_id = request.id.clone();

        debug!(id = %expected_id, method = %request.method, "Sending MCP request");

        let request_value =
            serde_json::to_value(&request).map_err(|e| McpError::Protocol(e.to_string()))?;
        self.write(&mut *transport, request_value).await?;

        loop {
            let value = match transport.receive().await {
                Ok(Some(value)) => value,
                Ok(None) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(McpError::Closed);
                }
                Err(e) => return Err(McpError::Transport(e.to_string())),
            };

            match Incoming::classify(value).map_err(|e| McpError::Protocol(e.to_string()))? {
                Incoming::Response(response) if response.id.as_ref() == Some(&expected_id) => {
                    return Ok(response);
                }
                Incoming::Response(response) => {
                    warn!(id = ?response.id, expected = %expected_id, "Skipping response with unexpected id");
                }
                Incoming::Notification(notification) => {
                    debug!(method = %notification.method, "Ignoring server notification");
                }
                Incoming::Request(server_request) => {
                    let reply = if server_request.method == methods::PING {
                        JsonRpcResponse::success(server_request.id, serde_json::json!({}))
                    } else {
                        warn!(method = %server_request.method, "Rejecting unsupported server request");
                        JsonRpcResponse::failure(
                            server_request.id,
                            error_codes::METHOD_NOT_FOUND,
                            format!("Method not found: {}", server_request.method),
                        )
                    };
                    let reply =
                        serde_json::to_value(&reply).map_err(|e| McpError::Protocol(e.to_string()))?;
                    self.write(&mut *transport, reply).await?;
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

#[derive(Debug, serde::Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion", default)]
    protocol_version: String,
    #[serde(default)]
    capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo", default)]
    server_info: ServerInfoInner,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ServerInfoInner {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, serde::Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// MCP errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Server error ({code}): {message}")]
    Server { code: i64, message: String },
    #[error("Connection to MCP server is closed")]
    Closed,
}
