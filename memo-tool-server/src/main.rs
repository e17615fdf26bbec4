use clap::Parser;
use memo_tool_server::Cli;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    memo_tool_server::run(cli).await?;
    Ok(())
}
