// Stream transport tests - event stream plus POST channel against the real
// SSE router on an ephemeral port.

mod support;

use futures::future::join_all;
use memo_agent_core::transport::{
    McpConnector, McpSession, SessionState, ToolTransport, TransportError, connect_event_stream,
};
use memo_agent_core::config::TransportConfig;
use memo_agent_core::ToolCallRequest;
use memo_tool_server::backend::MemoryBackend;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{HANDSHAKE_TIMEOUT, spawn_sse_server};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

async fn sse_session(url: &str) -> McpSession {
    let connection = connect_event_stream(url, HANDSHAKE_TIMEOUT)
        .await
        .expect("event stream");
    McpSession::open(url, connection, HANDSHAKE_TIMEOUT)
        .await
        .expect("handshake")
}

#[tokio::test]
async fn ten_concurrent_calls_round_trip_over_sse() {
    let url = spawn_sse_server(Arc::new(MemoryBackend::new())).await;
    let session = sse_session(&url).await;
    assert_eq!(session.state(), SessionState::Ready);

    let requests: Vec<_> = (0..10)
        .map(|index| {
            ToolCallRequest::new(
                format!("sse-{index}"),
                "create_memo",
                json!({"title": format!("note {index}"), "content": null}),
            )
        })
        .collect();
    let results = join_all(
        requests
            .iter()
            .map(|request| session.invoke(request, CALL_TIMEOUT)),
    )
    .await;

    for (index, result) in results.into_iter().enumerate() {
        let result = result.expect("tool result");
        assert_eq!(result.call_id, format!("sse-{index}"));
        assert_eq!(
            result.payload.expect("payload")["title"],
            json!(format!("note {index}"))
        );
    }
    session.shutdown().await;
}

#[tokio::test]
async fn tool_list_is_stable_within_a_session() {
    let url = spawn_sse_server(Arc::new(MemoryBackend::new())).await;
    let session = sse_session(&url).await;
    let first = session.list_tools().await.expect("first listing");
    let second = session.list_tools().await.expect("second listing");
    assert_eq!(first.len(), 5);
    assert_eq!(first, second);
}

#[tokio::test]
async fn connector_opens_sse_sessions_from_config() {
    let url = spawn_sse_server(Arc::new(MemoryBackend::new())).await;
    let connector = McpConnector::new(TransportConfig::stream(url));
    let session = connector.connect().await.expect("connect");

    let request = ToolCallRequest::new("d1", "delete_memo", json!({"memo_id": 999}));
    match session.invoke(&request, CALL_TIMEOUT).await {
        Err(TransportError::RemoteFault { message, .. }) => {
            assert_eq!(message, "Memo with id 999 not found");
        }
        other => panic!("expected remote fault, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_connect_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = connect_event_stream(&format!("http://{addr}/sse"), Duration::from_secs(2))
        .await
        .err()
        .expect("nothing is listening");
    assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
}
