//! JSON-RPC 2.0 envelope handling and the MCP message shapes used on both
//! sides of a transport.

mod framing;
mod mcp;

pub use framing::{FrameError, FrameReader, Framing, write_frame};
pub use mcp::{
    CallToolParams, CallToolResult, ContentItem, Implementation, InitializeParams,
    InitializeResult, ListToolsResult,
};

use serde_json::{Value, json};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
}

pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const NOT_INITIALIZED: i64 = -32002;
}

/// An inbound JSON-RPC message after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    Notification {
        method: String,
        params: Value,
    },
    Response {
        id: Value,
        result: Value,
    },
    Error {
        id: Value,
        code: i64,
        message: String,
    },
    Invalid {
        id: Option<Value>,
        reason: String,
    },
}

impl RpcMessage {
    pub fn classify(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return RpcMessage::Invalid {
                id: None,
                reason: "message is not a JSON object".into(),
            };
        };

        let id = map.remove("id").filter(|id| !id.is_null());
        let method = map
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);
        let params = map.remove("params").unwrap_or(Value::Null);

        match (id, method) {
            (Some(id), Some(method)) => RpcMessage::Request { id, method, params },
            (None, Some(method)) => RpcMessage::Notification { method, params },
            (Some(id), None) => {
                if let Some(error) = map.remove("error") {
                    let code = error
                        .get("code")
                        .and_then(Value::as_i64)
                        .unwrap_or(error_codes::INTERNAL_ERROR);
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string();
                    RpcMessage::Error { id, code, message }
                } else if let Some(result) = map.remove("result") {
                    RpcMessage::Response { id, result }
                } else {
                    RpcMessage::Invalid {
                        id: Some(id),
                        reason: "response carries neither 'result' nor 'error'".into(),
                    }
                }
            }
            (None, None) => RpcMessage::Invalid {
                id: None,
                reason: "message has neither 'id' nor 'method'".into(),
            },
        }
    }
}

pub fn request(id: &Value, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

pub fn response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

pub fn error_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        },
    })
}

/// Normalises a JSON-RPC id into a map key.
pub fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
