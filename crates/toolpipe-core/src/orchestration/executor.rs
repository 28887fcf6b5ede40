//! Tool invocation executor
//!
//! Turns a model-proposed tool call into a dispatch against the tool host and
//! reports what happened as an [`ExecutionOutcome`]. Nothing here returns an
//! error: a bad call is data for the model, not a reason to end the query.

use std::collections::HashMap;

use async_trait::async_trait;
use jsonschema::{Draft, JSONSchema};
use serde_json::{Map, Value};
use toolpipe_mcp::{McpClient, McpError, McpTool, ToolCallResult, Transport};
use tracing::{debug, info, warn};

use super::tool_result::normalize_tool_result;
use crate::session::ToolCallRequest;

/// Result of executing one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The host ran the tool; normalized result text
    Success(String),
    /// The arguments were not a well-formed JSON object
    ArgumentError(String),
    /// The host failed to run the tool
    ToolError(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    /// Text that goes into the tool turn
    pub fn content(&self) -> &str {
        match self {
            ExecutionOutcome::Success(text)
            | ExecutionOutcome::ArgumentError(text)
            | ExecutionOutcome::ToolError(text) => text,
        }
    }

    pub fn into_content(self) -> String {
        match self {
            ExecutionOutcome::Success(text)
            | ExecutionOutcome::ArgumentError(text)
            | ExecutionOutcome::ToolError(text) => text,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success(_) => "success",
            ExecutionOutcome::ArgumentError(_) => "argument_error",
            ExecutionOutcome::ToolError(_) => "tool_error",
        }
    }
}

/// The remote side that actually runs tools
#[async_trait]
pub trait ToolHost: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError>;

    /// False once the channel to the host is gone for good
    fn is_connected(&self) -> bool;
}

#[async_trait]
impl<T: Transport> ToolHost for McpClient<T> {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        McpClient::call_tool(self, name, arguments).await
    }

    fn is_connected(&self) -> bool {
        !self.is_closed()
    }
}

/// Parse raw tool-call arguments, which must be a JSON object
pub fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("Error parsing tool arguments: {}", e))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!(
            "Error: tool arguments must be a JSON object, got {}",
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Executes tool calls against a host, optionally checking input schemas first
pub struct ToolExecutor {
    validators: HashMap<String, JSONSchema>,
}

impl ToolExecutor {
    /// Executor that only checks argument shape
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Executor that also validates arguments against each tool's input schema
    pub fn strict(catalog: &[McpTool]) -> Self {
        let mut validators = HashMap::new();

        for tool in catalog {
            match JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&tool.input_schema)
            {
                Ok(schema) => {
                    validators.insert(tool.name.clone(), schema);
                }
                Err(e) => {
                    warn!(tool = %tool.name, error = %e, "Input schema does not compile; arguments will not be validated");
                }
            }
        }

        Self { validators }
    }

    /// Build the executor a catalog calls for
    pub fn for_catalog(catalog: &[McpTool], strict: bool) -> Self {
        if strict {
            Self::strict(catalog)
        } else {
            Self::new()
        }
    }

    /// Whether arguments for `tool` are schema-checked before dispatch
    pub fn validates(&self, tool: &str) -> bool {
        self.validators.contains_key(tool)
    }

    fn check_schema(&self, name: &str, arguments: &Value) -> Result<(), String> {
        let Some(schema) = self.validators.get(name) else {
            return Ok(());
        };

        if let Err(errors) = schema.validate(arguments) {
            let problems: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(format!(
                "Error: arguments for {} do not match its input schema: {}",
                name,
                problems.join("; ")
            ));
        }
        Ok(())
    }

    /// Execute one tool call
    pub async fn execute(&self, host: &dyn ToolHost, request: &ToolCallRequest) -> ExecutionOutcome {
        let arguments = match parse_arguments(&request.arguments) {
            Ok(map) => Value::Object(map),
            Err(message) => {
                debug!(tool = %request.name, raw = %request.arguments, "Rejected tool arguments");
                return ExecutionOutcome::ArgumentError(message);
            }
        };

        if let Err(message) = self.check_schema(&request.name, &arguments) {
            return ExecutionOutcome::ArgumentError(message);
        }

        info!(tool = %request.name, call_id = %request.id, "Dispatching tool call");

        match host.call_tool(&request.name, arguments).await {
            Ok(result) if result.is_error => ExecutionOutcome::ToolError(format!(
                "Error from tool {}: {}",
                request.name,
                normalize_tool_result(&result)
            )),
            Ok(result) => ExecutionOutcome::Success(normalize_tool_result(&result)),
            Err(e) => ExecutionOutcome::ToolError(format!("Error calling tool {}: {}", request.name, e)),
        }
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Host that records calls and answers from a closure
    struct FakeHost<F> {
        respond: F,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl<F> FakeHost<F>
    where
        F: Fn(&str, &Value) -> Result<ToolCallResult, McpError> + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                respond,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl<F> ToolHost for FakeHost<F>
    where
        F: Fn(&str, &Value) -> Result<ToolCallResult, McpError> + Send + Sync,
    {
        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
            self.calls.lock().unwrap().push((name.to_string(), arguments.clone()));
            (self.respond)(name, &arguments)
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn text_result(text: &str) -> ToolCallResult {
        serde_json::from_value(json!({ "content": [{ "type": "text", "text": text }] })).unwrap()
    }

    fn request(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn echo_host() -> FakeHost<impl Fn(&str, &Value) -> Result<ToolCallResult, McpError> + Send + Sync> {
        FakeHost::new(|name: &str, args: &Value| Ok(text_result(&format!("{} {}", name, args))))
    }

    #[test]
    fn test_parse_arguments_accepts_objects_only() {
        assert!(parse_arguments(r#"{"path": "/tmp"}"#).is_ok());
        assert!(parse_arguments("{}").is_ok());

        for bad in ["not json", "", "\"/tmp\"", "[1, 2]", "42", "null", "true", "{\"a\":"] {
            let err = parse_arguments(bad).unwrap_err();
            assert!(err.starts_with("Error"), "{bad:?} gave {err}");
        }
    }

    #[test]
    fn test_parse_arguments_names_the_wrong_shape() {
        assert!(parse_arguments("\"/tmp\"").unwrap_err().contains("a string"));
        assert!(parse_arguments("[]").unwrap_err().contains("an array"));
    }

    #[tokio::test]
    async fn test_success_returns_normalized_text() {
        let host = echo_host();
        let outcome = ToolExecutor::new()
            .execute(&host, &request("list_directory", r#"{"path":"/tmp"}"#))
            .await;

        assert_eq!(outcome, ExecutionOutcome::Success(r#"list_directory {"path":"/tmp"}"#.to_string()));
        let calls = host.calls.lock().unwrap();
        assert_eq!(calls[0].1, json!({ "path": "/tmp" }));
    }

    #[tokio::test]
    async fn test_malformed_arguments_never_reach_host() {
        let host = echo_host();
        let executor = ToolExecutor::new();

        for raw in ["not json", "\"/tmp\"", "[\"/tmp\"]"] {
            let outcome = executor.execute(&host, &request("read_file", raw)).await;
            assert!(matches!(outcome, ExecutionOutcome::ArgumentError(_)), "{raw}");
            assert!(outcome.content().contains("Error"));
        }
        assert!(host.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_host_fault_is_tool_error() {
        let host = FakeHost::new(|name: &str, _: &Value| {
            Err(McpError::Server {
                code: -32602,
                message: format!("Unknown tool: {}", name),
            })
        });

        let outcome = ToolExecutor::new()
            .execute(&host, &request("no_such_tool", "{}"))
            .await;

        match outcome {
            ExecutionOutcome::ToolError(msg) => {
                assert!(msg.starts_with("Error calling tool no_such_tool"));
                assert!(msg.contains("Unknown tool"));
            }
            other => panic!("expected tool error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_is_error_result_is_tool_error() {
        let host = FakeHost::new(|_: &str, _: &Value| {
            let mut result = text_result("Weather information not available for Paris");
            result.is_error = true;
            Ok(result)
        });

        let outcome = ToolExecutor::new()
            .execute(&host, &request("get_weather", r#"{"city":"Paris"}"#))
            .await;

        assert_eq!(
            outcome,
            ExecutionOutcome::ToolError(
                "Error from tool get_weather: Weather information not available for Paris".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_valid_objects_never_yield_argument_error_without_strict_mode() {
        let host = echo_host();
        let executor = ToolExecutor::new();

        for raw in [r#"{}"#, r#"{"unexpected": 1}"#, r#"{"path": 5, "nested": {"a": [1]}}"#] {
            let outcome = executor.execute(&host, &request("read_file", raw)).await;
            assert!(outcome.is_success(), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_strict_mode_checks_schema() {
        let catalog = vec![McpTool {
            name: "get_weather".to_string(),
            description: None,
            input_schema: json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            }),
        }];
        let executor = ToolExecutor::for_catalog(&catalog, true);
        let host = echo_host();

        assert!(executor.validates("get_weather"));
        assert!(!executor.validates("other"));

        let outcome = executor.execute(&host, &request("get_weather", r#"{"town":"Tokyo"}"#)).await;
        match outcome {
            ExecutionOutcome::ArgumentError(msg) => {
                assert!(msg.contains("get_weather"));
                assert!(msg.contains("city"));
            }
            other => panic!("expected argument error, got {:?}", other),
        }

        let outcome = executor.execute(&host, &request("get_weather", r#"{"city":"Tokyo"}"#)).await;
        assert!(outcome.is_success());
        assert_eq!(host.calls.lock().unwrap().len(), 1);
    }
}
