use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required field 'model' in configuration")]
    MissingModel,

    #[error("provider is missing required field 'endpoint'")]
    MissingEndpoint,

    #[error("transport mode '{0}' is not supported (expected 'stdio' or 'sse')")]
    UnknownMode(String),

    #[error("stdio transport requires a 'command'")]
    MissingCommand,

    #[error("sse transport requires a 'url'")]
    MissingUrl,

    #[error("'{field}' must be greater than zero")]
    ZeroValue { field: &'static str },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::NotFound { path } => format!(
                "Configuration file {} was not found. Pass --config or create it.",
                path.display()
            ),
            other => format!("Configuration problem: {other}"),
        }
    }
}
