pub mod cli;
pub mod console;

pub use cli::Cli;

use console::Console;
use memo_agent_core::config::{TransportOverrides, load_config};
use memo_agent_core::{Agent, AgentOptions, McpConnector, OpenAIClient};
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing();
    debug!(
        config = ?cli.config,
        mode = ?cli.mode,
        server_url = ?cli.server_url,
        "CLI arguments parsed"
    );

    let overrides = TransportOverrides {
        mode: cli.mode.map(|mode| mode.as_str().to_string()),
        url: cli.server_url.clone(),
    };
    let config = load_config(cli.config.as_deref(), overrides)
        .inspect_err(|err| eprintln!("{}", err.user_message()))?;
    info!(
        model = %config.model,
        transport = %config.transport.mode(),
        "Loaded configuration"
    );

    let mut options = AgentOptions::from_config(&config);
    if let Some(system) = cli.system {
        options.system_prompt = Some(system);
    }
    if let Some(max_cycles) = cli.max_cycles.filter(|max| *max > 0) {
        options.max_cycles = max_cycles;
    }

    let provider = OpenAIClient::from_config(&config.provider);
    let connector = Arc::new(McpConnector::new(config.transport.clone()));
    let agent = Agent::new(provider, connector, options);

    let result = Console::stdio().run(&agent).await;
    agent.shutdown().await;
    info!("Client execution finished");
    result.map_err(Into::into)
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
