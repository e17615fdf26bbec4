//! SSE mode: `GET /sse` opens an event stream whose first event names the
//! POST endpoint for that session; replies to POSTed requests come back as
//! `message` events on the stream.

use crate::error::ServerError;
use crate::server::McpHandler;
use crate::toolbox::Toolbox;
use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const STREAM_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";

#[derive(Clone)]
struct SseSession {
    handler: Arc<McpHandler>,
    events: mpsc::UnboundedSender<Value>,
}

struct Shared {
    toolbox: Toolbox,
    sessions: Mutex<HashMap<String, SseSession>>,
}

#[derive(Clone)]
pub struct SseState {
    shared: Arc<Shared>,
}

impl SseState {
    pub fn new(toolbox: Toolbox) -> Self {
        Self {
            shared: Arc::new(Shared {
                toolbox,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SseSession>> {
        self.shared
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, id: &str, session: SseSession) {
        self.sessions().insert(id.to_string(), session);
    }

    fn session(&self, id: &str) -> Option<SseSession> {
        self.sessions().get(id).cloned()
    }

    fn remove(&self, id: &str) {
        self.sessions().remove(id);
    }
}

/// Drops the session entry once the client's event stream goes away.
struct SessionGuard {
    state: SseState,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        debug!(session_id = %self.id, "event stream closed");
        self.state.remove(&self.id);
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: String,
}

pub fn router(state: SseState) -> Router {
    Router::new()
        .route(STREAM_PATH, get(open_stream))
        .route(MESSAGES_PATH, post(post_message))
        .with_state(state)
}

pub async fn serve(state: SseState, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "SSE server ready, stream at {STREAM_PATH}");

    axum::serve(listener, router(state).into_make_service())
        .await
        .map_err(ServerError::Serve)
}

async fn open_stream(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().to_string();
    let (events, receiver) = mpsc::unbounded_channel();
    state.register(
        &session_id,
        SseSession {
            handler: Arc::new(McpHandler::new(state.shared.toolbox.clone())),
            events,
        },
    );
    info!(session_id = %session_id, "event stream opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGES_PATH}?session_id={session_id}"));
    let guard = SessionGuard {
        state,
        id: session_id,
    };
    let messages = UnboundedReceiverStream::new(receiver).map(move |message: Value| {
        let _session = &guard;
        Ok::<_, Infallible>(Event::default().event("message").data(message.to_string()))
    });

    Sse::new(stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn post_message(
    State(state): State<SseState>,
    Query(query): Query<MessageQuery>,
    Json(message): Json<Value>,
) -> Response {
    let Some(session) = state.session(&query.session_id) else {
        warn!(session_id = %query.session_id, "message for unknown session");
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    tokio::spawn(async move {
        if let Some(reply) = session.handler.handle(message).await {
            if session.events.send(reply).is_err() {
                debug!("event stream gone before reply was sent");
            }
        }
    });
    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use reqwest::Client;
    use serde_json::json;

    async fn spawn_server() -> (String, SseState) {
        let state = SseState::new(Toolbox::new(Arc::new(MemoryBackend::new())));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), state)
    }

    #[test]
    fn sessions_are_tracked_after_a_poisoned_lock() {
        let state = SseState::new(Toolbox::new(Arc::new(MemoryBackend::new())));
        let poisoner = state.clone();
        let _ = std::thread::spawn(move || {
            let _held = poisoner.shared.sessions.lock().unwrap();
            panic!("panic while holding the session map");
        })
        .join();
        assert!(state.shared.sessions.is_poisoned());

        let (events, _receiver) = mpsc::unbounded_channel();
        state.register(
            "s1",
            SseSession {
                handler: Arc::new(McpHandler::new(state.shared.toolbox.clone())),
                events,
            },
        );
        assert!(state.session("s1").is_some());
        assert_eq!(state.session_count(), 1);

        state.remove("s1");
        assert!(state.session("s1").is_none());
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let (base, _state) = spawn_server().await;
        let response = Client::new()
            .post(format!("{base}{MESSAGES_PATH}?session_id=missing"))
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
            .send()
            .await
            .expect("post");
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn first_event_announces_message_endpoint() {
        let (base, state) = spawn_server().await;
        let response = Client::new()
            .get(format!("{base}{STREAM_PATH}"))
            .send()
            .await
            .expect("get");
        assert!(response.status().is_success());

        let mut body = response.bytes_stream();
        let mut text = String::new();
        while !text.contains("\n\n") {
            let chunk = body.next().await.expect("chunk").expect("bytes");
            text.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(text.starts_with("event: endpoint"));
        assert!(text.contains("data: /messages?session_id="));
        assert_eq!(state.session_count(), 1);
    }
}
