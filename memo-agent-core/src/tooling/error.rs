use crate::domain::SchemaError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool server advertises no tools")]
    Empty,
    #[error("tool '{tool}' has a malformed input schema: {source}")]
    MalformedSchema {
        tool: String,
        #[source]
        source: SchemaError,
    },
    #[error("tool '{0}' is advertised more than once")]
    DuplicateTool(String),
    #[error("tool name must not be empty")]
    UnnamedTool,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RegistryError {
    pub fn user_message(&self) -> String {
        match self {
            RegistryError::Transport(err) => err.user_message(),
            other => format!("The memo tool server offered an unusable tool list ({other})."),
        }
    }
}

/// Failures detected before a call reaches the transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {}", .problems.join("; "))]
    Validation { tool: String, problems: Vec<String> },
}

impl ToolError {
    pub fn user_message(&self) -> String {
        match self {
            ToolError::UnknownTool(name) => {
                format!("Tool \"{name}\" is not available on the server.")
            }
            ToolError::Validation { tool, problems } => {
                format!("Tool \"{tool}\" was called incorrectly: {}", problems.join("; "))
            }
        }
    }
}
