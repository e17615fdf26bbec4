// Pipe transport tests - sessions over an in-memory byte pipe
//
// The happy paths talk to the real stdio server loop; ordering and timeout
// cases use a hand-driven fake server on the other end of the pipe.

mod support;

use futures::future::join_all;
use memo_agent_core::domain::ToolFailureKind;
use memo_agent_core::protocol::{self, FrameReader, Framing, methods, write_frame};
use memo_agent_core::tooling::{ToolInvoker, ToolRegistry};
use memo_agent_core::transport::{
    McpSession, SessionState, ToolTransport, TransportError, connect_streams,
};
use memo_agent_core::ToolCallRequest;
use memo_tool_server::backend::MemoryBackend;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use support::{HANDSHAKE_TIMEOUT, framed_pipe_to_server, pipe_session};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn handshake_then_lists_memo_tools() {
    let session = pipe_session(Arc::new(MemoryBackend::new())).await;
    assert_eq!(session.state(), SessionState::Ready);

    let tools = session.list_tools().await.expect("tools");
    let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["create_memo", "list_memos", "get_memo", "update_memo", "delete_memo"]
    );
    assert_eq!(session.list_tools().await.expect("again"), tools);
    session.shutdown().await;
}

#[tokio::test]
async fn ten_concurrent_calls_each_get_their_own_result() {
    let session = pipe_session(Arc::new(MemoryBackend::new())).await;
    let requests: Vec<_> = (0..10)
        .map(|index| {
            ToolCallRequest::new(
                format!("call-{index}"),
                "create_memo",
                json!({"title": format!("memo {index}")}),
            )
        })
        .collect();

    let results = join_all(
        requests
            .iter()
            .map(|request| session.invoke(request, CALL_TIMEOUT)),
    )
    .await;

    let mut ids = Vec::new();
    for (index, result) in results.into_iter().enumerate() {
        let result = result.expect("tool result");
        assert_eq!(result.call_id, format!("call-{index}"));
        let payload = result.payload.expect("payload");
        assert_eq!(payload["title"], json!(format!("memo {index}")));
        ids.push(payload["id"].as_i64().expect("memo id"));
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn remote_fault_text_reaches_the_caller() {
    let session = pipe_session(Arc::new(MemoryBackend::new())).await;
    let request = ToolCallRequest::new("c1", "get_memo", json!({"memo_id": 42}));
    match session.invoke(&request, CALL_TIMEOUT).await {
        Err(TransportError::RemoteFault { message, .. }) => {
            assert_eq!(message, "Memo with id 42 not found");
        }
        other => panic!("expected remote fault, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn content_length_framing_carries_multiline_content() {
    let connection = framed_pipe_to_server(Arc::new(MemoryBackend::new()), Framing::ContentLength);
    let session = McpSession::open("content-length", connection, HANDSHAKE_TIMEOUT)
        .await
        .expect("handshake");
    assert_eq!(session.list_tools().await.expect("tools").len(), 5);

    let content = "first line\nsecond line\n";
    let create = ToolCallRequest::new(
        "c1",
        "create_memo",
        json!({"title": "groceries", "content": content}),
    );
    let created = session
        .invoke(&create, CALL_TIMEOUT)
        .await
        .expect("create")
        .payload
        .expect("payload");
    assert_eq!(created["content"], json!(content));

    let fetch = ToolCallRequest::new("c2", "get_memo", json!({"memo_id": created["id"]}));
    let fetched = session
        .invoke(&fetch, CALL_TIMEOUT)
        .await
        .expect("get")
        .payload
        .expect("payload");
    assert_eq!(fetched["title"], json!("groceries"));
    assert_eq!(fetched["content"], json!(content));
    session.shutdown().await;
}

type ServerRead = FrameReader<ReadHalf<DuplexStream>>;
type ServerWrite = WriteHalf<DuplexStream>;

/// Connection whose server side is driven by the test.
fn scripted_pipe() -> (memo_agent_core::transport::Connection, ServerRead, ServerWrite) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (server_read, server_write) = tokio::io::split(server);
    (
        connect_streams(client_read, client_write, Framing::NewlineDelimited),
        FrameReader::new(server_read, Framing::NewlineDelimited),
        server_write,
    )
}

async fn next_message(reader: &mut ServerRead) -> Value {
    let frame = reader
        .next_frame()
        .await
        .expect("frame")
        .expect("client closed the pipe");
    serde_json::from_str(&frame).expect("json frame")
}

async fn send(writer: &mut ServerWrite, message: Value) {
    write_frame(writer, Framing::NewlineDelimited, &message.to_string())
        .await
        .expect("write frame");
}

/// Answers `initialize` and swallows `notifications/initialized`.
async fn accept_handshake(reader: &mut ServerRead, writer: &mut ServerWrite) {
    let init = next_message(reader).await;
    assert_eq!(init["method"], json!(methods::INITIALIZE));
    send(
        writer,
        protocol::response(
            init["id"].clone(),
            json!({
                "protocolVersion": protocol::PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake", "version": "0.0.0"}
            }),
        ),
    )
    .await;
    let initialized = next_message(reader).await;
    assert_eq!(initialized["method"], json!(methods::INITIALIZED));
}

#[tokio::test]
async fn responses_in_reverse_order_are_matched_by_id() {
    let (connection, mut reader, mut writer) = scripted_pipe();
    let server = tokio::spawn(async move {
        accept_handshake(&mut reader, &mut writer).await;
        let first = next_message(&mut reader).await;
        let second = next_message(&mut reader).await;
        for request in [second, first] {
            let echo = request["params"]["arguments"].clone();
            send(
                &mut writer,
                protocol::response(
                    request["id"].clone(),
                    json!({
                        "content": [{"type": "text", "text": echo.to_string()}],
                        "isError": false
                    }),
                ),
            )
            .await;
        }
        (reader, writer)
    });

    let session = McpSession::open("fake", connection, HANDSHAKE_TIMEOUT)
        .await
        .expect("handshake");
    let a = ToolCallRequest::new("a", "echo", json!({"tag": "first"}));
    let b = ToolCallRequest::new("b", "echo", json!({"tag": "second"}));
    let (result_a, result_b) = tokio::join!(
        session.invoke(&a, CALL_TIMEOUT),
        session.invoke(&b, CALL_TIMEOUT)
    );

    let result_a = result_a.expect("a");
    let result_b = result_b.expect("b");
    assert_eq!(result_a.call_id, "a");
    assert_eq!(result_a.payload, Some(json!({"tag": "first"})));
    assert_eq!(result_b.call_id, "b");
    assert_eq!(result_b.payload, Some(json!({"tag": "second"})));
    let _ = server.await;
}

#[tokio::test]
async fn unresponsive_server_yields_timeout_result() {
    let (connection, mut reader, mut writer) = scripted_pipe();
    let server = tokio::spawn(async move {
        accept_handshake(&mut reader, &mut writer).await;
        let list = next_message(&mut reader).await;
        assert_eq!(list["method"], json!(methods::TOOLS_LIST));
        send(
            &mut writer,
            protocol::response(
                list["id"].clone(),
                json!({"tools": [{"name": "stall", "inputSchema": {"type": "object"}}]}),
            ),
        )
        .await;
        // Read the call and never answer it.
        let call = next_message(&mut reader).await;
        assert_eq!(call["method"], json!(methods::TOOLS_CALL));
        (reader, writer)
    });

    let session = McpSession::open("silent", connection, HANDSHAKE_TIMEOUT)
        .await
        .expect("handshake");
    let transport: Arc<dyn ToolTransport> = Arc::new(session.clone());
    let registry = ToolRegistry::load(transport.as_ref()).await.expect("registry");
    let invoker = ToolInvoker::new(transport, Arc::new(registry), Duration::from_millis(200));

    let result = invoker
        .invoke(&ToolCallRequest::new("t1", "stall", json!({})))
        .await;
    assert!(!result.success);
    assert_eq!(result.call_id, "t1");
    assert_eq!(result.error_kind(), Some(ToolFailureKind::Timeout));
    assert_eq!(session.state(), SessionState::Ready);

    let _server_halves = server.await.expect("fake server");
}

#[tokio::test]
async fn server_hangup_closes_the_session() {
    let (connection, mut reader, mut writer) = scripted_pipe();
    let server = tokio::spawn(async move {
        accept_handshake(&mut reader, &mut writer).await;
    });
    let session = McpSession::open("short-lived", connection, HANDSHAKE_TIMEOUT)
        .await
        .expect("handshake");
    server.await.expect("fake server");

    let request = ToolCallRequest::new("late", "anything", json!({}));
    let err = session
        .invoke(&request, CALL_TIMEOUT)
        .await
        .expect_err("session is gone");
    assert!(err.is_session_fatal(), "unexpected error: {err:?}");
}
