use clap::Parser;
use memo_agent_cli::Cli;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    memo_agent_cli::run(cli).await
}
