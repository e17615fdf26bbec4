pub const DEFAULT_CONFIG_PATH: &str = "config/client.toml";
pub const ENV_FILE: &str = "config/.env";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

pub const DEFAULT_MAX_CYCLES: usize = 10;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SSE_URL: &str = "http://localhost:8001/sse";

pub const ENV_MCP_MODE: &str = "MCP_MODE";
pub const ENV_MCP_SERVER_URL: &str = "MCP_SERVER_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
