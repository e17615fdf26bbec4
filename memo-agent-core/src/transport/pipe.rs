use super::{Connection, Outbound, TransportError};
use crate::config::PipeSettings;
use crate::protocol::{FrameReader, Framing, write_frame};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, warn};

const EXIT_GRACE: Duration = Duration::from_secs(2);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct PipeOutbound {
    label: String,
    framing: Framing,
    writer: AsyncMutex<Option<BoxedWriter>>,
    child: AsyncMutex<Option<Child>>,
}

/// Spawns the tool server and wires its stdin/stdout into a [`Connection`].
pub fn spawn_process(settings: &PipeSettings) -> Result<Connection, TransportError> {
    let mut command = Command::new(&settings.command);
    command
        .args(&settings.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(dir) = &settings.workdir {
        command.current_dir(dir);
    }
    for (key, value) in &settings.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| {
        TransportError::connect(format!("failed to spawn '{}': {source}", settings.command))
    })?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| TransportError::connect("failed to capture tool server stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TransportError::connect("failed to capture tool server stdout"))?;

    debug!(command = %settings.command, pid = ?child.id(), "spawned tool server");
    Ok(build(
        format!("stdio:{}", settings.command),
        stdout,
        Box::new(stdin),
        settings.framing,
        Some(child),
    ))
}

/// Builds a connection over an already-open byte stream pair.
pub fn connect_streams<R, W>(reader: R, writer: W, framing: Framing) -> Connection
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    build("stream-pair".to_string(), reader, Box::new(writer), framing, None)
}

fn build<R>(
    label: String,
    reader: R,
    writer: BoxedWriter,
    framing: Framing,
    child: Option<Child>,
) -> Connection
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(read_frames(label.clone(), reader, framing, tx));
    Connection {
        outbound: Box::new(PipeOutbound {
            label,
            framing,
            writer: AsyncMutex::new(Some(writer)),
            child: AsyncMutex::new(child),
        }),
        inbound: rx,
    }
}

async fn read_frames<R>(label: String, reader: R, framing: Framing, tx: mpsc::UnboundedSender<Value>)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameReader::new(reader, framing);
    loop {
        match frames.next_frame().await {
            Ok(Some(frame)) => match serde_json::from_str::<Value>(&frame) {
                Ok(value) => {
                    if tx.send(value).is_err() {
                        break;
                    }
                }
                Err(source) => {
                    warn!(server = %label, %source, "skipping non-JSON output from tool server");
                }
            },
            Ok(None) => {
                debug!(server = %label, "tool server output ended");
                break;
            }
            Err(err) => {
                warn!(server = %label, %err, "failed to read from tool server");
                break;
            }
        }
    }
}

#[async_trait]
impl Outbound for PipeOutbound {
    async fn send(&self, message: &Value) -> Result<(), TransportError> {
        let encoded = serde_json::to_string(message)
            .map_err(|source| TransportError::protocol(format!("unencodable message: {source}")))?;
        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or(TransportError::Closed)?;
        write_frame(stream, self.framing, &encoded)
            .await
            .map_err(|source| {
                TransportError::protocol(format!("failed to write to {}: {source}", self.label))
            })
    }

    async fn shutdown(&self) {
        // Closing stdin is the polite way to ask a stdio server to exit.
        self.writer.lock().await.take();

        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(server = %self.label, %status, "tool server exited"),
            Ok(Err(err)) => debug!(server = %self.label, %err, "failed to wait for tool server"),
            Err(_) => {
                if let Err(err) = child.kill().await {
                    debug!(
                        server = %self.label,
                        %err,
                        "failed to kill tool server (may have already exited)"
                    );
                }
            }
        }
    }
}
