//! Stdio mode: frames in on one stream, replies out on the other.

use crate::error::ServerError;
use crate::server::McpHandler;
use memo_agent_core::protocol::{self, FrameReader, Framing, error_codes, write_frame};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Serves one client until its input closes.
///
/// Requests are handled concurrently; a single writer task serialises the
/// replies so frames never interleave.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    framing: Framing,
    handler: Arc<McpHandler>,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (replies, mut outgoing) = mpsc::unbounded_channel::<Value>();
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(reply) = outgoing.recv().await {
            write_frame(&mut writer, framing, &reply.to_string())
                .await
                .map_err(ServerError::Write)?;
        }
        Ok::<_, ServerError>(())
    });

    let mut frames = FrameReader::new(reader, framing);
    let mut inflight = JoinSet::new();
    let read_result = loop {
        let frame = match frames.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(err) => break Err(ServerError::Read(err)),
        };

        let message = match serde_json::from_str::<Value>(&frame) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "unparseable frame");
                let _ = replies.send(protocol::error_response(
                    Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {err}"),
                ));
                continue;
            }
        };

        let handler = Arc::clone(&handler);
        let replies = replies.clone();
        inflight.spawn(async move {
            if let Some(reply) = handler.handle(message).await {
                let _ = replies.send(reply);
            }
        });

        while inflight.try_join_next().is_some() {}
    };

    while inflight.join_next().await.is_some() {}
    drop(replies);
    debug!("input closed, flushing replies");

    let write_result = match writer_task.await {
        Ok(result) => result,
        Err(err) => Err(ServerError::Write(std::io::Error::other(err))),
    };
    info!("stdio session ended");
    read_result.and(write_result)
}
