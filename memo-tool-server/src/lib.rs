//! MCP tool server for memo management, reachable over stdio or SSE.

pub mod backend;
pub mod cli;
pub mod error;
pub mod server;
pub mod sse;
pub mod stdio;
pub mod toolbox;

pub use cli::Cli;
pub use error::ServerError;
pub use server::McpHandler;
pub use sse::SseState;
pub use toolbox::Toolbox;

use backend::{HttpBackend, MemoBackend, MemoryBackend};
use cli::{BackendKind, ServeMode};
use memo_agent_core::protocol::Framing;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), ServerError> {
    init_tracing();

    let backend: Arc<dyn MemoBackend> = match cli.backend {
        BackendKind::Http => {
            let backend = HttpBackend::new(&cli.backend_url);
            info!(url = %backend.resource_url(), "using HTTP memo backend");
            Arc::new(backend)
        }
        BackendKind::Memory => {
            info!("using in-memory memo backend");
            Arc::new(MemoryBackend::new())
        }
    };
    let toolbox = Toolbox::new(backend);

    match cli.mode {
        ServeMode::Stdio => {
            let framing = if cli.content_length {
                Framing::ContentLength
            } else {
                Framing::NewlineDelimited
            };
            info!(?framing, "serving on stdio");
            let handler = Arc::new(McpHandler::new(toolbox));
            stdio::serve(tokio::io::stdin(), tokio::io::stdout(), framing, handler).await
        }
        ServeMode::Sse => {
            let addr = SocketAddr::new(cli.host, cli.port);
            sse::serve(SseState::new(toolbox), addr).await
        }
    }
}

/// Logs go to stderr; in stdio mode stdout carries the protocol.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}
