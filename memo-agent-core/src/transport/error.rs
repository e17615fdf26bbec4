use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to tool server: {0}")]
    Connect(String),
    #[error("tool server protocol error: {0}")]
    Protocol(String),
    #[error("tool '{tool}' did not answer within {after:?}")]
    Timeout { tool: String, after: Duration },
    #[error("{message}")]
    RemoteFault { code: Option<i64>, message: String },
    #[error("tool server connection closed")]
    Closed,
}

impl TransportError {
    pub fn connect(message: impl Into<String>) -> Self {
        TransportError::Connect(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        TransportError::Protocol(message.into())
    }

    /// True when the session that produced this error can no longer be used.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Protocol(_) | TransportError::Closed
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            TransportError::Connect(_) => {
                "Could not reach the memo tool server. Check that it is running and the transport settings are correct."
                    .to_string()
            }
            TransportError::Protocol(_) | TransportError::Closed => {
                "The connection to the memo tool server broke. It will be re-established on the next message."
                    .to_string()
            }
            TransportError::Timeout { tool, .. } => {
                format!("Tool \"{tool}\" took too long to answer.")
            }
            TransportError::RemoteFault { message, .. } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_fault_text_is_preserved_verbatim() {
        let err = TransportError::RemoteFault {
            code: None,
            message: "Memo with id 999 not found".into(),
        };
        assert_eq!(err.to_string(), "Memo with id 999 not found");
        assert_eq!(err.user_message(), "Memo with id 999 not found");
        assert!(!err.is_session_fatal());
    }

    #[test]
    fn connection_level_errors_are_fatal() {
        assert!(TransportError::connect("refused").is_session_fatal());
        assert!(TransportError::protocol("bad frame").is_session_fatal());
        assert!(TransportError::Closed.is_session_fatal());
        assert!(
            !TransportError::Timeout {
                tool: "get_memo".into(),
                after: Duration::from_secs(1)
            }
            .is_session_fatal()
        );
    }
}
