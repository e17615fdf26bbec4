use super::defaults::{
    DEFAULT_CHAT_PATH, DEFAULT_OPENAI_ENDPOINT, DEFAULT_TEMPERATURE, ENV_OPENAI_API_KEY,
};
use serde::Deserialize;

/// OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_path: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct RawProviderConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_path: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            api_key: None,
            api_path: DEFAULT_CHAT_PATH.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl ProviderConfig {
    /// Resolves the raw section. An `api_key` that expands to nothing falls
    /// back to `OPENAI_API_KEY`.
    pub(super) fn from_raw(raw: RawProviderConfig, expand: impl Fn(&str) -> String) -> Self {
        let api_key = raw
            .api_key
            .map(|key| expand(key.as_str()))
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                std::env::var(ENV_OPENAI_API_KEY)
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            });

        Self {
            endpoint: raw
                .endpoint
                .map(|endpoint| expand(endpoint.as_str()))
                .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string()),
            api_key,
            api_path: raw
                .api_path
                .unwrap_or_else(|| DEFAULT_CHAT_PATH.to_string()),
            temperature: raw.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }

    pub fn chat_url(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.api_path.trim_start_matches('/')
        )
    }
}
