use super::CONFIG_PATH;
use super::app::{AgentSettings, AppConfig};
use super::defaults::{
    DEFAULT_MAX_CYCLES, DEFAULT_MODEL, DEFAULT_TOOL_TIMEOUT_SECS, ENV_FILE, ENV_MCP_MODE,
    ENV_MCP_SERVER_URL,
};
use super::error::ConfigError;
use super::provider::{ProviderConfig, RawProviderConfig};
use super::transport::{RawTransportConfig, TransportOverrides};
use dotenvy::from_filename;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    system_prompt: Option<String>,
    #[serde(default)]
    provider: RawProviderConfig,
    #[serde(default)]
    agent: RawAgentConfig,
    #[serde(default)]
    transport: RawTransportConfig,
}

#[derive(Debug, Deserialize, Default)]
struct RawAgentConfig {
    max_cycles: Option<usize>,
    tool_timeout_secs: Option<u64>,
    parallel_tool_calls: Option<bool>,
}

/// Ensures environment variables are loaded from config/.env, falling back
/// to .env in the working directory.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        if from_filename(ENV_FILE).is_err() {
            let _ = dotenvy::dotenv();
        }
    });
}

/// Load and validate configuration. `overrides` win over `MCP_MODE` /
/// `MCP_SERVER_URL`, which win over the file.
pub fn load_config(
    path: Option<&Path>,
    overrides: TransportOverrides,
) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
    debug!(path = %config_path.display(), "Reading client configuration file");

    let content = fs::read_to_string(config_path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: config_path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: config_path.to_path_buf(),
                source,
            }
        }
    })?;

    let overrides = TransportOverrides {
        mode: overrides.mode.or_else(|| env_value(ENV_MCP_MODE)),
        url: overrides.url.or_else(|| env_value(ENV_MCP_SERVER_URL)),
    };
    parse_config(&content, config_path, &overrides)
}

/// Parses and validates configuration text without touching the filesystem.
pub fn parse_config(
    content: &str,
    path: &Path,
    overrides: &TransportOverrides,
) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed, overrides)
}

fn validate_and_build(
    parsed: RawConfig,
    overrides: &TransportOverrides,
) -> Result<AppConfig, ConfigError> {
    let model = match parsed.model {
        Some(model) if model.trim().is_empty() => return Err(ConfigError::MissingModel),
        Some(model) => model,
        None => DEFAULT_MODEL.to_string(),
    };

    if parsed
        .provider
        .endpoint
        .as_deref()
        .is_some_and(|endpoint| endpoint.trim().is_empty())
    {
        return Err(ConfigError::MissingEndpoint);
    }
    let provider = ProviderConfig::from_raw(parsed.provider, expand);

    let max_cycles = parsed.agent.max_cycles.unwrap_or(DEFAULT_MAX_CYCLES);
    if max_cycles == 0 {
        return Err(ConfigError::ZeroValue {
            field: "agent.max_cycles",
        });
    }
    let tool_timeout_secs = parsed
        .agent
        .tool_timeout_secs
        .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS);
    if tool_timeout_secs == 0 {
        return Err(ConfigError::ZeroValue {
            field: "agent.tool_timeout_secs",
        });
    }

    let transport = parsed.transport.resolve(overrides, expand)?;

    Ok(AppConfig {
        model,
        system_prompt: parsed
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty()),
        provider,
        agent: AgentSettings {
            max_cycles,
            tool_timeout: Duration::from_secs(tool_timeout_secs),
            parallel_tool_calls: parsed.agent.parallel_tool_calls.unwrap_or(true),
        },
        transport,
    })
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TransportMode, TransportSettings};
    use crate::protocol::Framing;

    fn parse(content: &str) -> Result<AppConfig, ConfigError> {
        parse_config(content, Path::new("client.toml"), &TransportOverrides::default())
    }

    #[test]
    fn applies_defaults() {
        let config = parse(
            r#"
            [transport]
            command = "memo-tool-server"
            "#,
        )
        .expect("config");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.agent.max_cycles, 10);
        assert_eq!(config.agent.tool_timeout, Duration::from_secs(30));
        assert!(config.agent.parallel_tool_calls);
        assert_eq!(config.transport.mode(), TransportMode::Stdio);
        assert_eq!(config.transport.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.provider.temperature, 0.0);
    }

    #[test]
    fn reads_pipe_settings() {
        let config = parse(
            r#"
            model = "gpt-4o"
            [transport]
            mode = "stdio"
            command = "memo-tool-server"
            args = ["--backend", "memory"]
            framing = "content-length"
            env = { MEMO_API_URL = "http://127.0.0.1:9000" }
            "#,
        )
        .expect("config");
        let TransportSettings::Pipe(pipe) = &config.transport.settings else {
            panic!("expected pipe settings");
        };
        assert_eq!(pipe.args, vec!["--backend", "memory"]);
        assert_eq!(pipe.framing, Framing::ContentLength);
        assert_eq!(pipe.env["MEMO_API_URL"], "http://127.0.0.1:9000");
    }

    #[test]
    fn stdio_mode_needs_a_command() {
        assert!(matches!(parse(""), Err(ConfigError::MissingCommand)));
    }

    #[test]
    fn sse_mode_needs_a_url() {
        let err = parse("[transport]\nmode = \"sse\"").expect_err("missing url");
        assert!(matches!(err, ConfigError::MissingUrl));
    }

    #[test]
    fn overrides_switch_transport_mode() {
        let overrides = TransportOverrides {
            mode: Some("SSE".into()),
            url: None,
        };
        let config = parse_config(
            "[transport]\ncommand = \"memo-tool-server\"",
            Path::new("client.toml"),
            &overrides,
        )
        .expect("config");
        assert_eq!(
            config.transport.settings,
            TransportSettings::Stream(crate::config::StreamSettings {
                url: "http://localhost:8001/sse".into()
            })
        );
    }

    #[test]
    fn rejects_zero_limits_and_unknown_modes() {
        let zero = parse("[agent]\nmax_cycles = 0\n[transport]\ncommand = \"x\"");
        assert!(matches!(zero, Err(ConfigError::ZeroValue { .. })));
        let mode = parse("[transport]\nmode = \"carrier-pigeon\"");
        assert!(matches!(mode, Err(ConfigError::UnknownMode(_))));
        assert!(matches!(parse("model = \"\""), Err(ConfigError::MissingModel)));
    }

    #[test]
    fn reports_toml_errors_with_path() {
        let err = parse("model = [").expect_err("parse error");
        assert!(err.to_string().contains("client.toml"));
    }
}
