//! HTTP event-stream transport: server-to-client messages arrive on a
//! long-lived `GET` event stream, client-to-server messages are `POST`ed to
//! the endpoint announced in the stream's first `endpoint` event.

use super::{Connection, Outbound, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use reqwest_eventsource::{Event, EventSource, retry::Never};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const ENDPOINT_EVENT: &str = "endpoint";
const MESSAGE_EVENT: &str = "message";

struct StreamOutbound {
    client: Client,
    endpoint: Url,
    pump: Mutex<Option<JoinHandle<()>>>,
}

pub async fn connect_event_stream(
    url: &str,
    timeout: Duration,
) -> Result<Connection, TransportError> {
    let base = Url::parse(url)
        .map_err(|source| TransportError::connect(format!("invalid server url '{url}': {source}")))?;
    let client = Client::new();

    let mut source = EventSource::new(client.get(base.clone()))
        .map_err(|source| TransportError::connect(format!("cannot open event stream: {source}")))?;
    source.set_retry_policy(Box::new(Never));
    let mut source = Box::pin(source);

    let endpoint = tokio::time::timeout(timeout, wait_for_endpoint(&mut source, &base))
        .await
        .map_err(|_| {
            TransportError::connect(format!("no endpoint event from {url} within {timeout:?}"))
        })??;
    debug!(server = %url, %endpoint, "event stream established");

    let (tx, rx) = mpsc::unbounded_channel();
    let label = url.to_string();
    let pump = tokio::spawn(async move {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    if message.event != MESSAGE_EVENT && !message.event.is_empty() {
                        debug!(server = %label, event = %message.event, "ignoring event");
                        continue;
                    }
                    match serde_json::from_str::<Value>(&message.data) {
                        Ok(value) => {
                            if tx.send(value).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(server = %label, %err, "skipping non-JSON message event")
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    debug!(server = %label, "event stream ended");
                    break;
                }
                Err(err) => {
                    warn!(server = %label, %err, "event stream failed");
                    break;
                }
            }
        }
    });

    Ok(Connection {
        outbound: Box::new(StreamOutbound {
            client,
            endpoint,
            pump: Mutex::new(Some(pump)),
        }),
        inbound: rx,
    })
}

async fn wait_for_endpoint(
    source: &mut std::pin::Pin<Box<EventSource>>,
    base: &Url,
) -> Result<Url, TransportError> {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => continue,
            Ok(Event::Message(message)) if message.event == ENDPOINT_EVENT => {
                return base.join(message.data.trim()).map_err(|err| {
                    TransportError::protocol(format!(
                        "invalid endpoint '{}': {err}",
                        message.data
                    ))
                });
            }
            Ok(Event::Message(message)) => {
                debug!(event = %message.event, "event before endpoint announcement ignored");
            }
            Err(err) => {
                return Err(TransportError::connect(format!(
                    "event stream failed before endpoint announcement: {err}"
                )));
            }
        }
    }
    Err(TransportError::connect(
        "event stream closed before endpoint announcement",
    ))
}

impl StreamOutbound {
    fn stop_pump(&self) {
        let handle = self
            .pump
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

#[async_trait]
impl Outbound for StreamOutbound {
    async fn send(&self, message: &Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(message)
            .send()
            .await
            .map_err(|source| {
                TransportError::protocol(format!("failed to post to {}: {source}", self.endpoint))
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::protocol(format!(
                "server rejected message with {status}: {body}"
            )))
        }
    }

    async fn shutdown(&self) {
        self.stop_pump();
    }
}

impl Drop for StreamOutbound {
    fn drop(&mut self) {
        self.stop_pump();
    }
}
