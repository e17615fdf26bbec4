//! Shared fixtures: in-process tool servers and a scripted model.

#![allow(dead_code)]

use async_trait::async_trait;
use memo_agent_core::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use memo_agent_core::protocol::Framing;
use memo_agent_core::transport::{
    Connection, McpSession, ToolTransport, TransportError, TransportFactory, connect_streams,
};
use memo_agent_core::{Message, ToolCallRequest};
use memo_tool_server::backend::{MemoBackend, MemoryBackend};
use memo_tool_server::{McpHandler, SseState, Toolbox};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the real stdio server loop on one end of an in-memory pipe and
/// returns a connection to the other end.
pub fn pipe_to_server(backend: Arc<dyn MemoBackend>) -> Connection {
    framed_pipe_to_server(backend, Framing::NewlineDelimited)
}

pub fn framed_pipe_to_server(backend: Arc<dyn MemoBackend>, framing: Framing) -> Connection {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let handler = Arc::new(McpHandler::new(Toolbox::new(backend)));
    tokio::spawn(memo_tool_server::stdio::serve(
        server_read,
        server_write,
        framing,
        handler,
    ));
    let (client_read, client_write) = tokio::io::split(client);
    connect_streams(client_read, client_write, framing)
}

pub async fn pipe_session(backend: Arc<dyn MemoBackend>) -> McpSession {
    McpSession::open("in-process", pipe_to_server(backend), HANDSHAKE_TIMEOUT)
        .await
        .expect("handshake with in-process server")
}

/// Serves the SSE router on an ephemeral port; returns the stream URL.
pub async fn spawn_sse_server(backend: Arc<dyn MemoBackend>) -> String {
    let state = SseState::new(Toolbox::new(backend));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = memo_tool_server::sse::router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/sse")
}

/// Opens pipe sessions against one shared in-memory store.
pub struct InProcessFactory {
    backend: Arc<MemoryBackend>,
    opens: AtomicUsize,
}

impl InProcessFactory {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> Arc<MemoryBackend> {
        Arc::clone(&self.backend)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportFactory for InProcessFactory {
    async fn open(&self) -> Result<Arc<dyn ToolTransport>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let backend: Arc<dyn MemoBackend> = self.backend.clone();
        let session = McpSession::open("in-process", pipe_to_server(backend), HANDSHAKE_TIMEOUT)
            .await?;
        Ok(Arc::new(session))
    }
}

/// Replays canned assistant messages and records every request.
#[derive(Clone)]
pub struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Message>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().await.push(request);
        self.replies
            .lock()
            .await
            .pop_front()
            .map(ModelResponse::new)
            .ok_or_else(|| ModelError::invalid_response("scripted", "no reply left"))
    }
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Message {
    Message::assistant_with_calls("", calls)
}
