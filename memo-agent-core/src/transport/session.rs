use super::{Connection, Outbound, TransportError, ToolTransport};
use crate::domain::{ToolCallRequest, ToolCallResult, ToolDescriptor};
use crate::protocol::{
    self, CallToolResult, InitializeResult, ListToolsResult, PROTOCOL_VERSION, RpcMessage,
    error_codes, methods,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Responder = oneshot::Sender<Result<Value, TransportError>>;

const MAX_TOOL_PAGES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Connecting,
    Ready,
    Closed,
}

/// One initialized MCP conversation over a [`Connection`].
///
/// Requests are correlated with responses purely by JSON-RPC id, so any
/// number of calls may be in flight at once regardless of the transport.
#[derive(Clone)]
pub struct McpSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    label: String,
    outbound: Box<dyn Outbound>,
    state: Mutex<SessionState>,
    pending: Mutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
    server: Mutex<Option<InitializeResult>>,
    tools: AsyncMutex<Option<Vec<ToolDescriptor>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// Drops the pending entry when the waiting future goes away, whether it
/// completed, timed out or was cancelled.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<String, Responder>>,
    key: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl McpSession {
    /// Attaches to `connection` and completes the handshake. The connection
    /// is shut down when the handshake fails.
    pub async fn open(
        label: impl Into<String>,
        connection: Connection,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let session = Self::attach(label, connection);
        match session.initialize(handshake_timeout).await {
            Ok(()) => Ok(session),
            Err(err) => {
                session.shutdown().await;
                Err(err)
            }
        }
    }

    /// Starts reading from `connection` without performing the handshake.
    pub fn attach(label: impl Into<String>, connection: Connection) -> Self {
        let Connection { outbound, inbound } = connection;
        let inner = Arc::new(SessionInner {
            label: label.into(),
            outbound,
            state: Mutex::new(SessionState::Uninitialized),
            pending: Mutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            server: Mutex::new(None),
            tools: AsyncMutex::new(None),
            reader: Mutex::new(None),
        });

        let handle = tokio::spawn(reader_loop(Arc::downgrade(&inner), inbound));
        *lock(&inner.reader) = Some(handle);
        Self { inner }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Instructions the server advertised during the handshake, if any.
    pub fn instructions(&self) -> Option<String> {
        lock(&self.inner.server)
            .as_ref()
            .and_then(|server| server.instructions.clone())
    }

    pub async fn initialize(&self, timeout: Duration) -> Result<(), TransportError> {
        self.inner.set_state(SessionState::Connecting);
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let raw = match tokio::time::timeout(
            timeout,
            self.inner.send_request(methods::INITIALIZE, params),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(TransportError::RemoteFault { message, .. })) => {
                return Err(TransportError::connect(format!(
                    "server rejected initialize: {message}"
                )));
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(TransportError::connect(format!(
                    "no initialize response from {} within {timeout:?}",
                    self.inner.label
                )));
            }
        };

        let result: InitializeResult = serde_json::from_value(raw).map_err(|source| {
            TransportError::protocol(format!("malformed initialize result: {source}"))
        })?;
        if result.protocol_version != PROTOCOL_VERSION {
            warn!(
                server = %self.inner.label,
                version = %result.protocol_version,
                "tool server negotiated a different protocol version"
            );
        }
        let server_name = result
            .server_info
            .as_ref()
            .map(|info| info.name.clone())
            .unwrap_or_default();
        *lock(&self.inner.server) = Some(result);

        self.inner
            .write(&protocol::notification(methods::INITIALIZED, json!({})))
            .await?;
        self.inner.set_state(SessionState::Ready);
        info!(server = %self.inner.label, name = %server_name, "tool server session ready");
        Ok(())
    }

    pub async fn shutdown(&self) {
        let previous = self.inner.set_state(SessionState::Closed);
        if previous != SessionState::Closed {
            debug!(server = %self.inner.label, "closing tool server session");
        }
        self.inner.outbound.shutdown().await;
        if let Some(handle) = lock(&self.inner.reader).take() {
            handle.abort();
        }
        self.inner.fail_all_pending();
    }

    fn ensure_ready(&self) -> Result<(), TransportError> {
        match self.state() {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(TransportError::Closed),
            other => Err(TransportError::protocol(format!(
                "tool request issued before the handshake completed (session is {other:?})"
            ))),
        }
    }
}

#[async_trait]
impl ToolTransport for McpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        self.ensure_ready()?;
        let mut cache = self.inner.tools.lock().await;
        if let Some(tools) = cache.as_ref() {
            return Ok(tools.clone());
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_TOOL_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let raw = self
                .inner
                .send_request(methods::TOOLS_LIST, params)
                .await
                .map_err(|err| match err {
                    TransportError::RemoteFault { message, .. } => {
                        TransportError::protocol(format!("tools/list failed: {message}"))
                    }
                    other => other,
                })?;
            let page: ListToolsResult = serde_json::from_value(raw).map_err(|source| {
                TransportError::protocol(format!("malformed tools/list result: {source}"))
            })?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    debug!(server = %self.inner.label, count = tools.len(), "fetched tool catalogue");
                    *cache = Some(tools.clone());
                    return Ok(tools);
                }
            }
        }
        Err(TransportError::protocol(
            "tools/list pagination did not terminate",
        ))
    }

    async fn invoke(
        &self,
        request: &ToolCallRequest,
        timeout: Duration,
    ) -> Result<ToolCallResult, TransportError> {
        self.ensure_ready()?;
        let arguments = match &request.arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        let params = json!({ "name": request.name, "arguments": arguments });

        debug!(
            server = %self.inner.label,
            tool = %request.name,
            call_id = %request.id,
            "dispatching tool call"
        );
        let raw = tokio::time::timeout(
            timeout,
            self.inner.send_request(methods::TOOLS_CALL, params),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            tool: request.name.clone(),
            after: timeout,
        })??;

        let result: CallToolResult = serde_json::from_value(raw).map_err(|source| {
            TransportError::protocol(format!("malformed tools/call result: {source}"))
        })?;
        if result.is_error {
            return Err(TransportError::RemoteFault {
                code: None,
                message: result.text(),
            });
        }
        Ok(ToolCallResult::ok(
            request.id.clone(),
            request.name.clone(),
            result.payload(),
        ))
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}

impl SessionInner {
    fn set_state(&self, next: SessionState) -> SessionState {
        std::mem::replace(&mut *lock(&self.state), next)
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        if *lock(&self.state) == SessionState::Closed {
            return Err(TransportError::Closed);
        }
        let key = self.next_id();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(key.clone(), tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            key: key.clone(),
        };

        self.write(&protocol::request(&Value::String(key), method, params))
            .await?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Closed),
        }
    }

    async fn write(&self, message: &Value) -> Result<(), TransportError> {
        self.outbound.send(message).await
    }

    async fn dispatch(&self, value: Value) {
        match RpcMessage::classify(value) {
            RpcMessage::Response { id, result } => self.resolve(&id, Ok(result)),
            RpcMessage::Error { id, code, message } => self.resolve(
                &id,
                Err(TransportError::RemoteFault {
                    code: Some(code),
                    message,
                }),
            ),
            RpcMessage::Request { id, method, .. } => self.answer_server_request(id, &method).await,
            RpcMessage::Notification { method, .. } => {
                if method == methods::TOOLS_LIST_CHANGED {
                    info!(
                        server = %self.label,
                        "tool catalogue changed; keeping the session snapshot until reconnect"
                    );
                } else {
                    debug!(server = %self.label, method = %method, "notification from tool server");
                }
            }
            RpcMessage::Invalid { id, reason } => {
                warn!(server = %self.label, ?id, %reason, "ignoring malformed message");
                if let Some(id) = id {
                    self.resolve(
                        &id,
                        Err(TransportError::protocol(format!("malformed response: {reason}"))),
                    );
                }
            }
        }
    }

    fn resolve(&self, id: &Value, result: Result<Value, TransportError>) {
        let Some(key) = protocol::id_key(id) else {
            debug!(server = %self.label, ?id, "response carries an unusable id");
            return;
        };
        let responder = lock(&self.pending).remove(&key);
        match responder {
            Some(sender) => {
                let _ = sender.send(result);
            }
            None => debug!(
                server = %self.label,
                response_id = %key,
                "received response for unknown or abandoned request"
            ),
        }
    }

    async fn answer_server_request(&self, id: Value, method: &str) {
        let reply = if method == methods::PING {
            protocol::response(id, json!({}))
        } else {
            warn!(server = %self.label, method, "server sent unsupported request");
            protocol::error_response(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("client does not implement method '{method}'"),
            )
        };
        if let Err(err) = self.write(&reply).await {
            warn!(server = %self.label, %err, "failed to answer server request");
        }
    }

    fn fail_all_pending(&self) {
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        for (_, sender) in drained {
            let _ = sender.send(Err(TransportError::Closed));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.reader).take() {
            handle.abort();
        }
    }
}

async fn reader_loop(session: Weak<SessionInner>, mut inbound: mpsc::UnboundedReceiver<Value>) {
    while let Some(value) = inbound.recv().await {
        let Some(inner) = session.upgrade() else {
            return;
        };
        inner.dispatch(value).await;
    }

    if let Some(inner) = session.upgrade() {
        let previous = inner.set_state(SessionState::Closed);
        if previous != SessionState::Closed {
            warn!(server = %inner.label, "tool server closed the connection");
        }
        inner.fail_all_pending();
    }
}
