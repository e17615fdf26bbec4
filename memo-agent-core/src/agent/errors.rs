use crate::domain::Conversation;
use crate::model::ModelError;
use crate::tooling::RegistryError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("agent exceeded the maximum of {max} tool cycles")]
    CycleLimit { max: usize },
    #[error("turn cancelled")]
    Cancelled,
}

impl AgentError {
    /// Whether the tool session must be dropped after this error.
    pub fn discards_session(&self) -> bool {
        match self {
            AgentError::Transport(err) => err.is_session_fatal(),
            AgentError::Registry(_) | AgentError::Cancelled => true,
            AgentError::Model(_) | AgentError::CycleLimit { .. } => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AgentError::Transport(err) => err.user_message(),
            AgentError::Registry(err) => err.user_message(),
            AgentError::Model(err) => err.user_message(),
            AgentError::CycleLimit { max } => format!(
                "The assistant kept calling tools without finishing ({max} rounds). Try rephrasing the request."
            ),
            AgentError::Cancelled => "The request was cancelled.".to_string(),
        }
    }
}

/// A failed turn together with the conversation as it was before the turn.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct TurnError {
    #[source]
    pub error: AgentError,
    pub conversation: Conversation,
}

impl TurnError {
    pub fn new(error: AgentError, conversation: Conversation) -> Self {
        Self {
            error,
            conversation,
        }
    }

    pub fn user_message(&self) -> String {
        self.error.user_message()
    }
}
