//! JSON-RPC 2.0 message types used by MCP

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Method names used by the client
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PING: &str = "ping";
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const METHOD_NOT_FOUND: i64 = -32601;
}

/// Request identifier (MCP allows numbers or strings)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Classification of an incoming message
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Reply to one of our requests
    Response(JsonRpcResponse),
    /// Request initiated by the server
    Request(JsonRpcRequest),
    /// Notification (no id, no reply expected)
    Notification(JsonRpcNotification),
}

impl Incoming {
    /// Classify a raw JSON value read off the wire
    pub fn classify(value: Value) -> Result<Self, serde_json::Error> {
        let has_method = value.get("method").is_some();
        let has_id = value.get("id").is_some_and(|id| !id.is_null());

        match (has_method, has_id) {
            (true, true) => serde_json::from_value(value).map(Incoming::Request),
            (true, false) => serde_json::from_value(value).map(Incoming::Notification),
            _ => serde_json::from_value(value).map(Incoming::Response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_omits_missing_params() {
        let request = JsonRpcRequest::new(RequestId::Number(7), methods::TOOLS_LIST);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/list" }));
    }

    #[test]
    fn test_request_id_accepts_strings() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": "abc", "result": {} })).unwrap();
        assert_eq!(response.id, Some(RequestId::String("abc".to_string())));
    }

    #[test]
    fn test_classify_messages() {
        let response = Incoming::classify(json!({ "jsonrpc": "2.0", "id": 1, "result": {} })).unwrap();
        assert!(matches!(response, Incoming::Response(_)));

        let notification = Incoming::classify(json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": { "level": "info" }
        }))
        .unwrap();
        assert!(matches!(notification, Incoming::Notification(_)));

        let request = Incoming::classify(json!({ "jsonrpc": "2.0", "id": 9, "method": "ping" })).unwrap();
        match request {
            Incoming::Request(req) => assert_eq!(req.method, methods::PING),
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_response_shape() {
        let response = JsonRpcResponse::failure(RequestId::Number(3), error_codes::METHOD_NOT_FOUND, "nope");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"]["code"], -32601);
        assert!(value.get("result").is_none());
    }
}
