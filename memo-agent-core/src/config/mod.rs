pub mod app;
pub mod defaults;
pub mod error;
pub mod loader;
pub mod provider;
pub mod transport;

/// Default config file path - can be overridden via CLI argument
pub const CONFIG_PATH: &str = defaults::DEFAULT_CONFIG_PATH;

pub use app::{AgentSettings, AppConfig};
pub use error::ConfigError;
pub use loader::{ensure_env_loaded, load_config, parse_config};
pub use provider::ProviderConfig;
pub use transport::{
    PipeSettings, StreamSettings, TransportConfig, TransportMode, TransportOverrides,
    TransportSettings,
};
