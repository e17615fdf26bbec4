use super::error::ConfigError;
use super::provider::ProviderConfig;
use super::transport::{TransportConfig, TransportOverrides};
use std::path::Path;
use std::time::Duration;

/// Limits and switches for the agent loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub max_cycles: usize,
    pub tool_timeout: Duration,
    pub parallel_tool_calls: bool,
}

/// Application configuration loaded from client.toml
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub system_prompt: Option<String>,
    pub provider: ProviderConfig,
    pub agent: AgentSettings,
    pub transport: TransportConfig,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path, TransportOverrides::default())
    }
}
