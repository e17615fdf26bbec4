//! JSON-RPC dispatch for one client connection.

use crate::toolbox::Toolbox;
use memo_agent_core::protocol::{
    self, CallToolParams, Implementation, InitializeResult, ListToolsResult, PROTOCOL_VERSION,
    RpcMessage, error_codes, methods,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

pub const SERVER_NAME: &str = "memo-manager";

/// Handshake state is tracked per connection, so each client gets its own
/// handler over a shared [`Toolbox`].
pub struct McpHandler {
    toolbox: Toolbox,
    initialized: AtomicBool,
}

impl McpHandler {
    pub fn new(toolbox: Toolbox) -> Self {
        Self {
            toolbox,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Handles one inbound message and returns the reply, if any.
    pub async fn handle(&self, message: Value) -> Option<Value> {
        match RpcMessage::classify(message) {
            RpcMessage::Request { id, method, params } => {
                Some(self.handle_request(id, &method, params).await)
            }
            RpcMessage::Notification { method, .. } => {
                debug!(method = %method, "notification received");
                None
            }
            RpcMessage::Response { id, .. } | RpcMessage::Error { id, .. } => {
                debug!(id = %id, "ignoring unsolicited response");
                None
            }
            RpcMessage::Invalid { id, reason } => {
                warn!(reason = %reason, "invalid message");
                id.map(|id| protocol::error_response(id, error_codes::INVALID_REQUEST, reason))
            }
        }
    }

    async fn handle_request(&self, id: Value, method: &str, params: Value) -> Value {
        debug!(method, id = %id, "request received");
        match method {
            methods::INITIALIZE => {
                self.initialized.store(true, Ordering::Release);
                protocol::response(id, initialize_result(&params))
            }
            methods::PING => protocol::response(id, json!({})),
            methods::TOOLS_LIST | methods::TOOLS_CALL if !self.is_initialized() => {
                protocol::error_response(
                    id,
                    error_codes::NOT_INITIALIZED,
                    "received request before initialization was complete",
                )
            }
            methods::TOOLS_LIST => {
                let result = ListToolsResult {
                    tools: self.toolbox.descriptors(),
                    next_cursor: None,
                };
                protocol::response(id, to_json(&result))
            }
            methods::TOOLS_CALL => match serde_json::from_value::<CallToolParams>(params) {
                Ok(call) => {
                    let result = self.toolbox.call(&call.name, &call.arguments).await;
                    protocol::response(id, to_json(&result))
                }
                Err(err) => protocol::error_response(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("invalid tools/call params: {err}"),
                ),
            },
            other => {
                warn!(method = other, "unknown method");
                protocol::error_response(
                    id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                )
            }
        }
    }
}

fn initialize_result(params: &Value) -> Value {
    let requested = params.get("protocolVersion").and_then(Value::as_str);
    if let Some(version) = requested.filter(|version| *version != PROTOCOL_VERSION) {
        debug!(requested = version, "client asked for a different protocol version");
    }
    to_json(&InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: json!({"tools": {"listChanged": false}}),
        server_info: Some(Implementation {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
        instructions: None,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::sync::Arc;

    fn handler() -> McpHandler {
        McpHandler::new(Toolbox::new(Arc::new(MemoryBackend::new())))
    }

    fn request(id: u64, method: &str, params: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
    }

    async fn initialized() -> McpHandler {
        let handler = handler();
        handler
            .handle(request(0, methods::INITIALIZE, json!({"protocolVersion": PROTOCOL_VERSION})))
            .await;
        handler
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let reply = handler()
            .handle(request(1, methods::INITIALIZE, json!({})))
            .await
            .expect("reply");
        assert_eq!(reply["id"], json!(1));
        assert_eq!(reply["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(reply["result"]["serverInfo"]["name"], json!(SERVER_NAME));
    }

    #[tokio::test]
    async fn tools_are_rejected_before_initialize() {
        let handler = handler();
        let reply = handler
            .handle(request(1, methods::TOOLS_LIST, json!({})))
            .await
            .expect("reply");
        assert_eq!(reply["error"]["code"], json!(error_codes::NOT_INITIALIZED));

        let reply = handler.handle(request(2, methods::PING, Value::Null)).await;
        assert_eq!(reply.expect("pong")["result"], json!({}));
    }

    #[tokio::test]
    async fn lists_five_tools_after_initialize() {
        let reply = initialized()
            .await
            .handle(request(3, methods::TOOLS_LIST, json!({})))
            .await
            .expect("reply");
        let tools = reply["result"]["tools"].as_array().expect("tools");
        assert_eq!(tools.len(), 5);
        assert!(reply["result"].get("nextCursor").is_none());
    }

    #[tokio::test]
    async fn call_returns_tool_result_envelope() {
        let reply = initialized()
            .await
            .handle(request(
                4,
                methods::TOOLS_CALL,
                json!({"name": "create_memo", "arguments": {"title": "todo"}}),
            ))
            .await
            .expect("reply");
        assert_eq!(reply["result"]["isError"], json!(false));
        assert_eq!(reply["result"]["structuredContent"]["id"], json!(1));
    }

    #[tokio::test]
    async fn unknown_method_and_notifications() {
        let handler = initialized().await;
        let reply = handler
            .handle(request(5, "resources/list", json!({})))
            .await
            .expect("reply");
        assert_eq!(reply["error"]["code"], json!(error_codes::METHOD_NOT_FOUND));

        let none = handler
            .handle(json!({"jsonrpc": "2.0", "method": methods::INITIALIZED}))
            .await;
        assert!(none.is_none());
    }
}
