use super::errors::{AgentError, TurnError};
use super::models::{AgentOptions, TurnOutcome};
use super::turn::{LoopState, Turn};
use crate::domain::{Conversation, Message};
use crate::model::{ModelError, ModelProvider};
use crate::tooling::{ToolInvoker, ToolRegistry};
use crate::transport::{ToolTransport, TransportFactory};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

struct ActiveSession {
    transport: Arc<dyn ToolTransport>,
    invoker: ToolInvoker,
}

/// Owns the model client and, once needed, one tool-server session.
///
/// The session is opened on the first turn, reused across turns, and
/// discarded after a session-level failure so the next turn reconnects.
pub struct Agent<P: ModelProvider> {
    model: P,
    factory: Arc<dyn TransportFactory>,
    options: AgentOptions,
    session: Mutex<Option<ActiveSession>>,
}

impl<P: ModelProvider> Agent<P> {
    pub fn new(model: P, factory: Arc<dyn TransportFactory>, options: AgentOptions) -> Self {
        Self {
            model,
            factory,
            options,
            session: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Tool names of the live session, opening it when necessary.
    pub async fn tool_names(&self) -> Result<Vec<String>, AgentError> {
        let invoker = self.acquire().await?;
        Ok(invoker.registry().names().to_vec())
    }

    /// Runs one user turn on top of `conversation`.
    ///
    /// On failure the error carries `conversation` unchanged.
    pub async fn run(
        &self,
        conversation: &Conversation,
        input: impl Into<String>,
    ) -> Result<TurnOutcome, TurnError> {
        let mut working = conversation.clone();
        working.push(Message::user(input));
        self.drive(working)
            .await
            .map_err(|err| TurnError::new(err, conversation.clone()))
    }

    /// Like [`Agent::run`], but abandons the turn as soon as `cancel`
    /// resolves. In-flight tool calls are dropped and the session released.
    pub async fn run_until<C>(
        &self,
        conversation: &Conversation,
        input: impl Into<String>,
        cancel: C,
    ) -> Result<TurnOutcome, TurnError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run(conversation, input) => result,
            _ = cancel => {
                warn!("Agent turn cancelled");
                self.discard_session().await;
                Err(TurnError::new(AgentError::Cancelled, conversation.clone()))
            }
        }
    }

    async fn drive(&self, conversation: Conversation) -> Result<TurnOutcome, AgentError> {
        info!(messages = conversation.len(), "Agent turn started");
        let invoker = self.acquire().await?;
        let mut turn = Turn::new(conversation, &self.options);

        loop {
            match turn.step(&self.model, &invoker).await {
                Ok(LoopState::Done) => break,
                Ok(_) => continue,
                Err(err) => {
                    if err.discards_session() {
                        error!(%err, "Session-level failure, discarding tool session");
                        self.discard_session().await;
                    } else {
                        warn!(%err, "Agent turn failed");
                    }
                    return Err(err);
                }
            }
        }

        let cycles = turn.cycles();
        let outcome = turn
            .finish()
            .ok_or_else(|| ModelError::invalid_response("model", "turn ended without an answer"))?;
        info!(cycles, "Agent turn completed");
        Ok(outcome)
    }

    async fn acquire(&self) -> Result<ToolInvoker, AgentError> {
        let mut slot = self.session.lock().await;
        if let Some(active) = slot.as_ref() {
            return Ok(active.invoker.clone());
        }

        let transport = self.factory.open().await?;
        let registry = match ToolRegistry::load(transport.as_ref()).await {
            Ok(registry) => registry,
            Err(err) => {
                transport.close().await;
                return Err(err.into());
            }
        };
        info!(tools = registry.len(), "Tool session established");
        let invoker = ToolInvoker::new(
            Arc::clone(&transport),
            Arc::new(registry),
            self.options.tool_timeout,
        );
        *slot = Some(ActiveSession {
            transport,
            invoker: invoker.clone(),
        });
        Ok(invoker)
    }

    /// Closes and forgets the current session, if any.
    pub async fn discard_session(&self) {
        let active = self.session.lock().await.take();
        if let Some(active) = active {
            active.transport.close().await;
        }
    }

    pub async fn shutdown(&self) {
        self.discard_session().await;
        info!("Agent shut down");
    }
}
