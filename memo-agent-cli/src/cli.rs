use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "memo-agent",
    version,
    about = "Chat with an assistant that manages your memos through MCP tools"
)]
pub struct Cli {
    /// Path to client.toml (defaults to config/client.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// System prompt sent ahead of every model request
    #[arg(long)]
    pub system: Option<String>,
    /// Transport used to reach the tool server (overrides MCP_MODE)
    #[arg(long, value_enum)]
    pub mode: Option<TransportArg>,
    /// Event-stream URL for sse mode (overrides MCP_SERVER_URL)
    #[arg(long)]
    pub server_url: Option<String>,
    /// Maximum tool cycles per turn
    #[arg(long)]
    pub max_cycles: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Stdio,
    Sse,
}

impl TransportArg {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportArg::Stdio => "stdio",
            TransportArg::Sse => "sse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transport_overrides() {
        let cli = Cli::parse_from([
            "memo-agent",
            "--mode",
            "sse",
            "--server-url",
            "http://127.0.0.1:9001/sse",
            "--max-cycles",
            "4",
        ]);
        assert_eq!(cli.mode, Some(TransportArg::Sse));
        assert_eq!(cli.server_url.as_deref(), Some("http://127.0.0.1:9001/sse"));
        assert_eq!(cli.max_cycles, Some(4));
        assert!(cli.config.is_none());
    }
}
