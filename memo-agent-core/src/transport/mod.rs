//! Tool-server transports.
//!
//! Both variants reduce to a [`Connection`]: an outbound half that accepts
//! JSON-RPC messages and an inbound channel of decoded messages. The
//! [`McpSession`] on top does the handshake and id correlation, so the
//! pipe and the event stream behave identically above this layer.

mod error;
mod pipe;
mod session;
mod stream;

pub use error::TransportError;
pub use pipe::{connect_streams, spawn_process};
pub use session::{McpSession, SessionState};
pub use stream::connect_event_stream;

use crate::config::{TransportConfig, TransportSettings};
use crate::domain::{ToolCallRequest, ToolCallResult, ToolDescriptor};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Client-to-server half of a connection.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, message: &Value) -> Result<(), TransportError>;

    /// Releases the underlying resource. Safe to call more than once.
    async fn shutdown(&self);
}

pub struct Connection {
    pub outbound: Box<dyn Outbound>,
    pub inbound: mpsc::UnboundedReceiver<Value>,
}

/// An initialized session with a tool server.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError>;

    async fn invoke(
        &self,
        request: &ToolCallRequest,
        timeout: Duration,
    ) -> Result<ToolCallResult, TransportError>;

    async fn close(&self);
}

/// Opens fresh sessions; the agent calls this lazily and again after a
/// session has been discarded.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn ToolTransport>, TransportError>;
}

/// Opens MCP sessions over the transport chosen in configuration.
#[derive(Debug, Clone)]
pub struct McpConnector {
    config: TransportConfig,
}

impl McpConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub async fn connect(&self) -> Result<McpSession, TransportError> {
        let timeout = self.config.connect_timeout;
        let (label, connection) = match &self.config.settings {
            TransportSettings::Pipe(pipe) => {
                (format!("stdio:{}", pipe.command), spawn_process(pipe)?)
            }
            TransportSettings::Stream(stream) => (
                stream.url.clone(),
                connect_event_stream(&stream.url, timeout).await?,
            ),
        };
        McpSession::open(label, connection, timeout).await
    }
}

#[async_trait]
impl TransportFactory for McpConnector {
    async fn open(&self) -> Result<Arc<dyn ToolTransport>, TransportError> {
        let session = self.connect().await?;
        Ok(Arc::new(session))
    }
}
