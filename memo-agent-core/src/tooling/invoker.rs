use super::error::ToolError;
use super::registry::ToolRegistry;
use crate::domain::{ToolCallRequest, ToolCallResult, ToolFailureKind};
use crate::transport::{ToolTransport, TransportError};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Turns model-issued tool calls into transport requests.
///
/// `invoke` never fails: every outcome, including local rejection, comes
/// back as a [`ToolCallResult`] carrying the request's call id.
#[derive(Clone)]
pub struct ToolInvoker {
    transport: Arc<dyn ToolTransport>,
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(
        transport: Arc<dyn ToolTransport>,
        registry: Arc<ToolRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Checks a call against the registry without dispatching it.
    pub fn check(&self, request: &ToolCallRequest) -> Result<(), ToolError> {
        let tool = self
            .registry
            .get(&request.name)
            .ok_or_else(|| ToolError::UnknownTool(request.name.clone()))?;
        let problems = tool.schema.violations(&request.arguments);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ToolError::Validation {
                tool: request.name.clone(),
                problems,
            })
        }
    }

    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolCallResult {
        if let Err(err) = self.check(request) {
            warn!(tool = %request.name, call_id = %request.id, %err, "tool call rejected locally");
            let kind = match err {
                ToolError::UnknownTool(_) => ToolFailureKind::UnknownTool,
                ToolError::Validation { .. } => ToolFailureKind::Validation,
            };
            return ToolCallResult::failed(&request.id, &request.name, kind, err.to_string());
        }

        info!(tool = %request.name, call_id = %request.id, "invoking tool");
        match self.transport.invoke(request, self.timeout).await {
            Ok(mut result) => {
                // The transport copies the id already; enforce it regardless.
                result.call_id = request.id.clone();
                debug!(tool = %request.name, call_id = %request.id, "tool call succeeded");
                result
            }
            Err(err) => {
                let kind = match &err {
                    TransportError::Timeout { .. } => ToolFailureKind::Timeout,
                    TransportError::RemoteFault { .. } => ToolFailureKind::RemoteFault,
                    TransportError::Connect(_)
                    | TransportError::Protocol(_)
                    | TransportError::Closed => ToolFailureKind::Protocol,
                };
                warn!(tool = %request.name, call_id = %request.id, %kind, %err, "tool call failed");
                ToolCallResult::failed(&request.id, &request.name, kind, err.to_string())
            }
        }
    }

    /// Dispatches every call and returns results in the order of `calls`,
    /// regardless of completion order.
    pub async fn invoke_all(
        &self,
        calls: &[ToolCallRequest],
        parallel: bool,
    ) -> Vec<ToolCallResult> {
        if parallel {
            join_all(calls.iter().map(|call| self.invoke(call))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.invoke(call).await);
            }
            results
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    struct RecordingTransport {
        calls: Mutex<Vec<String>>,
        outcome: fn(&ToolCallRequest) -> Result<ToolCallResult, TransportError>,
    }

    #[async_trait]
    impl ToolTransport for RecordingTransport {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
            Ok(Vec::new())
        }

        async fn invoke(
            &self,
            request: &ToolCallRequest,
            _timeout: Duration,
        ) -> Result<ToolCallResult, TransportError> {
            self.calls.lock().unwrap().push(request.name.clone());
            (self.outcome)(request)
        }

        async fn close(&self) {}
    }

    fn build_invoker(
        outcome: fn(&ToolCallRequest) -> Result<ToolCallResult, TransportError>,
    ) -> (ToolInvoker, Arc<RecordingTransport>) {
        let registry = ToolRegistry::from_descriptors(vec![ToolDescriptor {
            name: "delete_memo".into(),
            description: Some("Delete a memo".into()),
            input_schema: json!({
                "type": "object",
                "properties": {"memo_id": {"type": "integer"}},
                "required": ["memo_id"]
            }),
        }])
        .expect("registry");
        let transport = Arc::new(RecordingTransport {
            calls: Mutex::new(Vec::new()),
            outcome,
        });
        let invoker = ToolInvoker::new(
            transport.clone(),
            Arc::new(registry),
            Duration::from_secs(1),
        );
        (invoker, transport)
    }

    fn echo(request: &ToolCallRequest) -> Result<ToolCallResult, TransportError> {
        Ok(ToolCallResult::ok(
            request.id.clone(),
            request.name.clone(),
            Value::String("ok".into()),
        ))
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_transport() {
        let (invoker, transport) = build_invoker(echo);
        let request = ToolCallRequest::new("call-1", "erase_everything", json!({}));
        let result = invoker.invoke(&request).await;
        assert!(!result.success);
        assert_eq!(result.call_id, "call-1");
        assert_eq!(result.error_kind(), Some(ToolFailureKind::UnknownTool));
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_required_field_fails_fast() {
        let (invoker, transport) = build_invoker(echo);
        let request = ToolCallRequest::new("call-2", "delete_memo", json!({}));
        let result = invoker.invoke(&request).await;
        assert_eq!(result.error_kind(), Some(ToolFailureKind::Validation));
        assert!(result.error_message().is_some_and(|msg| msg.contains("memo_id")));
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failures_become_failed_results() {
        let (invoker, _) = build_invoker(|request| {
            Err(TransportError::Timeout {
                tool: request.name.clone(),
                after: Duration::from_secs(1),
            })
        });
        let request = ToolCallRequest::new("call-3", "delete_memo", json!({"memo_id": 1}));
        let result = invoker.invoke(&request).await;
        assert_eq!(result.error_kind(), Some(ToolFailureKind::Timeout));
        assert!(!result.is_session_fatal());

        let (invoker, _) = build_invoker(|_| Err(TransportError::Closed));
        let result = invoker.invoke(&request).await;
        assert!(result.is_session_fatal());
    }

    #[tokio::test]
    async fn remote_fault_message_is_verbatim() {
        let (invoker, _) = build_invoker(|_| {
            Err(TransportError::RemoteFault {
                code: None,
                message: "Memo with id 999 not found".into(),
            })
        });
        let request = ToolCallRequest::new("call-4", "delete_memo", json!({"memo_id": 999}));
        let result = invoker.invoke(&request).await;
        assert_eq!(result.error_kind(), Some(ToolFailureKind::RemoteFault));
        assert_eq!(result.error_message(), Some("Memo with id 999 not found"));
    }

    #[tokio::test]
    async fn sequential_dispatch_keeps_order() {
        let (invoker, transport) = build_invoker(echo);
        let calls = vec![
            ToolCallRequest::new("a", "delete_memo", json!({"memo_id": 1})),
            ToolCallRequest::new("b", "nope", json!({})),
            ToolCallRequest::new("c", "delete_memo", json!({"memo_id": 3})),
        ];
        let results = invoker.invoke_all(&calls, false).await;
        let ids: Vec<_> = results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }
}
