use super::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A remote tool as advertised by the tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw JSON schema, forwarded verbatim to the model provider.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    UnknownTool,
    Validation,
    Timeout,
    RemoteFault,
    /// The session itself is unusable (malformed frames, closed channel).
    Protocol,
}

impl fmt::Display for ToolFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolFailureKind::UnknownTool => "unknown_tool",
            ToolFailureKind::Validation => "validation",
            ToolFailureKind::Timeout => "timeout",
            ToolFailureKind::RemoteFault => "remote_fault",
            ToolFailureKind::Protocol => "protocol",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

/// Uniform envelope for the outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub tool: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolCallResult {
    pub fn ok(call_id: impl Into<String>, tool: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        kind: ToolFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            success: false,
            payload: None,
            error: Some(ToolFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn error_kind(&self) -> Option<ToolFailureKind> {
        self.error.as_ref().map(|failure| failure.kind)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|failure| failure.message.as_str())
    }

    /// Whether the failure means the session has to be thrown away.
    pub fn is_session_fatal(&self) -> bool {
        self.error_kind() == Some(ToolFailureKind::Protocol)
    }

    /// Text the model sees for this result.
    pub fn render(&self) -> String {
        match (&self.payload, &self.error) {
            (_, Some(failure)) => format!("Error: {}", failure.message),
            (Some(Value::String(text)), None) => text.clone(),
            (Some(value), None) => value.to_string(),
            (None, None) => String::new(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::tool(self.call_id.clone(), self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageRole;
    use serde_json::json;

    #[test]
    fn success_renders_payload_as_json() {
        let result = ToolCallResult::ok("c1", "create_memo", json!({"id": 1, "title": "todo"}));
        let message = result.to_message();
        assert_eq!(message.role, MessageRole::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("c1"));
        assert!(message.content.contains("\"id\":1"));
    }

    #[test]
    fn string_payload_is_not_quoted() {
        let result = ToolCallResult::ok("c1", "get_memo", json!("plain text"));
        assert_eq!(result.render(), "plain text");
    }

    #[test]
    fn failure_keeps_message_verbatim() {
        let result = ToolCallResult::failed(
            "c9",
            "delete_memo",
            ToolFailureKind::RemoteFault,
            "memo 999 not found (404)",
        );
        assert!(!result.success);
        assert_eq!(result.render(), "Error: memo 999 not found (404)");
        assert!(!result.is_session_fatal());
    }
}
