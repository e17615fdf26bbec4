use super::defaults::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SSE_URL};
use super::error::ConfigError;
use crate::protocol::Framing;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Sse,
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportMode::Stdio),
            "sse" => Ok(TransportMode::Sse),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportMode::Stdio => "stdio",
            TransportMode::Sse => "sse",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeSettings {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
    pub framing: Framing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSettings {
    Pipe(PipeSettings),
    Stream(StreamSettings),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub settings: TransportSettings,
    pub connect_timeout: Duration,
}

impl TransportConfig {
    pub fn mode(&self) -> TransportMode {
        match self.settings {
            TransportSettings::Pipe(_) => TransportMode::Stdio,
            TransportSettings::Stream(_) => TransportMode::Sse,
        }
    }

    pub fn stream(url: impl Into<String>) -> Self {
        Self {
            settings: TransportSettings::Stream(StreamSettings { url: url.into() }),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct RawTransportConfig {
    pub mode: Option<String>,
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub workdir: Option<String>,
    #[serde(default)]
    pub framing: Framing,
    pub url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

/// Values that take precedence over the file, usually from the environment
/// or the command line.
#[derive(Debug, Clone, Default)]
pub struct TransportOverrides {
    pub mode: Option<String>,
    pub url: Option<String>,
}

impl RawTransportConfig {
    pub(super) fn resolve(
        self,
        overrides: &TransportOverrides,
        expand: impl Fn(&str) -> String,
    ) -> Result<TransportConfig, ConfigError> {
        let mode = match overrides.mode.as_deref().or(self.mode.as_deref()) {
            Some(mode) => mode.parse::<TransportMode>()?,
            None => TransportMode::Stdio,
        };
        let timeout_secs = self
            .connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroValue {
                field: "transport.connect_timeout_secs",
            });
        }

        let settings = match mode {
            TransportMode::Stdio => {
                let command = self
                    .command
                    .map(|command| expand(command.as_str()))
                    .filter(|command| !command.trim().is_empty())
                    .ok_or(ConfigError::MissingCommand)?;
                TransportSettings::Pipe(PipeSettings {
                    command,
                    args: self.args.iter().map(|arg| expand(arg.as_str())).collect(),
                    env: self
                        .env
                        .into_iter()
                        .map(|(key, value)| (key, expand(value.as_str())))
                        .collect(),
                    workdir: self.workdir.map(|dir| PathBuf::from(expand(dir.as_str()))),
                    framing: self.framing,
                })
            }
            TransportMode::Sse => {
                let url = overrides
                    .url
                    .clone()
                    .or(self.url)
                    .map(|url| expand(url.as_str()))
                    .filter(|url| !url.trim().is_empty())
                    // MCP_MODE=sse on its own points at the local default server.
                    .or_else(|| overrides.mode.as_ref().map(|_| DEFAULT_SSE_URL.to_string()))
                    .ok_or(ConfigError::MissingUrl)?;
                TransportSettings::Stream(StreamSettings { url })
            }
        };

        Ok(TransportConfig {
            settings,
            connect_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
