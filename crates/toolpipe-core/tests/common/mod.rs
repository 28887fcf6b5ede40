//! Shared fakes for integration tests
//!
//! `FakeMcpServer` is an in-memory `Transport` that answers MCP requests the
//! way a stdio tool server would. `ScriptedLlm` replays canned completions and
//! records every request it receives.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use toolpipe_core::{
    AssistantReply, CompletionClient, CompletionRequest, Config, Error, ToolCallRequest, Turn,
};
use toolpipe_mcp::Transport;

type Handler = dyn Fn(&str, &Value) -> Option<Value> + Send + Sync;

/// Observations shared between a test and the server it handed away
#[derive(Default)]
pub struct ServerLog {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub list_requests: AtomicUsize,
    pub closed: AtomicBool,
}

impl ServerLog {
    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub struct FakeMcpServer {
    tools: Vec<Value>,
    handler: Arc<Handler>,
    outbox: VecDeque<Value>,
    fail_initialize: bool,
    hung_up: bool,
    pub log: Arc<ServerLog>,
}

impl FakeMcpServer {
    /// Server whose tools echo their name and arguments as text
    pub fn new(tool_names: &[&str]) -> Self {
        let tools = tool_names
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "description": format!("The {} tool", name),
                    "inputSchema": {
                        "type": "object",
                        "properties": { "path": { "type": "string" } }
                    }
                })
            })
            .collect();

        Self {
            tools,
            handler: Arc::new(|name: &str, args: &Value| Some(text_result(&format!("{} {}", name, args)))),
            outbox: VecDeque::new(),
            fail_initialize: false,
            hung_up: false,
            log: Arc::new(ServerLog::default()),
        }
    }

    /// Replace the declared catalog with raw descriptors
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    /// Answer `tools/call`; returning `None` makes the server hang up
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn log(&self) -> Arc<ServerLog> {
        self.log.clone()
    }

    fn reply(&mut self, id: Value, result: Value) {
        self.outbox.push_back(json!({ "jsonrpc": "2.0", "id": id, "result": result }));
    }
}

pub fn text_result(text: &str) -> Value {
    json!({ "content": [{ "type": "text", "text": text }] })
}

#[async_trait]
impl Transport for FakeMcpServer {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        if self.hung_up {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "server went away"));
        }

        let Some(method) = message.get("method").and_then(Value::as_str) else {
            // A reply to one of our own requests
            return Ok(());
        };
        let id = message.get("id").cloned().unwrap_or(Value::Null);

        match method {
            "initialize" if self.fail_initialize => {
                self.outbox.push_back(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32603, "message": "server misconfigured" }
                }));
            }
            "initialize" => self.reply(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "fake-fs", "version": "1.0.0" }
                }),
            ),
            "notifications/initialized" => {}
            "tools/list" => {
                self.log.list_requests.fetch_add(1, Ordering::SeqCst);
                let tools = self.tools.clone();
                self.reply(id, json!({ "tools": tools }));
            }
            "tools/call" => {
                let name = message["params"]["name"].as_str().unwrap_or_default().to_string();
                let args = message["params"]["arguments"].clone();
                self.log.calls.lock().unwrap().push((name.clone(), args.clone()));

                match (self.handler)(&name, &args) {
                    Some(result) => self.reply(id, result),
                    None => self.hung_up = true,
                }
            }
            other => {
                self.outbox.push_back(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": format!("Method not found: {}", other) }
                }));
            }
        }
        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        Ok(self.outbox.pop_front())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// One scripted completion
pub enum Step {
    Reply(AssistantReply),
    Fail(String),
    /// Never completes
    Hang,
}

/// What the loop sent for one completion
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Turn>,
    pub tools: Option<Vec<String>>,
    pub max_tokens: u32,
}

#[derive(Default)]
pub struct RequestLog {
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl RequestLog {
    pub fn all(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub struct ScriptedLlm {
    steps: Mutex<VecDeque<Step>>,
    pub log: Arc<RequestLog>,
}

impl ScriptedLlm {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            log: Arc::new(RequestLog::default()),
        }
    }

    pub fn log(&self) -> Arc<RequestLog> {
        self.log.clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> toolpipe_core::Result<AssistantReply> {
        self.log.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            tools: request
                .tools
                .map(|t| t.iter().map(|f| f.name.clone()).collect()),
            max_tokens: request.max_tokens,
        });

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(message)) => Err(Error::Provider(message)),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(Error::Provider("no scripted completion left".to_string())),
        }
    }
}

pub fn say(text: &str) -> Step {
    Step::Reply(AssistantReply::text(text))
}

/// A reply that requests the given `(id, name, raw arguments)` calls
pub fn call_tools(calls: &[(&str, &str, &str)]) -> Step {
    Step::Reply(AssistantReply {
        content: None,
        tool_calls: calls
            .iter()
            .map(|(id, name, args)| ToolCallRequest::new(*id, *name, *args))
            .collect(),
    })
}

/// Config for tests: no network, deterministic prompt
pub fn test_config() -> Config {
    Config {
        api_key: Some("test-key".to_string()),
        system_prompt: Some("You are a test assistant.".to_string()),
        ..Default::default()
    }
}
