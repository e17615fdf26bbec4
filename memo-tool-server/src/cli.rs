use clap::{Parser, ValueEnum};
use std::net::IpAddr;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_PORT: u16 = 8001;

#[derive(Parser, Debug)]
#[command(
    name = "memo-tool-server",
    version,
    about = "MCP server exposing memo create/list/get/update/delete tools"
)]
pub struct Cli {
    /// How clients reach the server
    #[arg(long, value_enum, default_value_t = ServeMode::Stdio)]
    pub mode: ServeMode,
    /// Address to bind in sse mode
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,
    /// Port to bind in sse mode
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Where memos are stored
    #[arg(long, value_enum, default_value_t = BackendKind::Http)]
    pub backend: BackendKind,
    /// Base URL of the memo REST service
    #[arg(long, env = "MEMO_API_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,
    /// Use Content-Length framing on stdio instead of one message per line
    #[arg(long)]
    pub content_length: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServeMode {
    Stdio,
    Sse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Http,
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_mode_with_memory_backend() {
        let cli = Cli::parse_from([
            "memo-tool-server",
            "--mode",
            "sse",
            "--port",
            "9100",
            "--backend",
            "memory",
            "--backend-url",
            "http://memos.internal:8000",
        ]);
        assert_eq!(cli.mode, ServeMode::Sse);
        assert_eq!(cli.port, 9100);
        assert_eq!(cli.backend, BackendKind::Memory);
        assert_eq!(cli.backend_url, "http://memos.internal:8000");
        assert!(!cli.content_length);
    }

    #[test]
    fn stdio_is_the_default_mode() {
        let cli = Cli::parse_from(["memo-tool-server", "--backend-url", "http://x"]);
        assert_eq!(cli.mode, ServeMode::Stdio);
        assert_eq!(cli.port, DEFAULT_PORT);
    }
}
