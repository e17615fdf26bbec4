use memo_agent_core::protocol::FrameError;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind SSE listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("SSE server error: {0}")]
    Serve(#[source] std::io::Error),
    #[error("failed to read from stdin: {0}")]
    Read(#[from] FrameError),
    #[error("failed to write to stdout: {0}")]
    Write(#[source] std::io::Error),
}
