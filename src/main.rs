mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mediabox::capabilities::CapabilitySnapshot;
use mediabox::config::Config;
use mediabox::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = Config::load().map_err(|e| format!("Failed to load config: {e}"))?;
    init_tracing(&config.telemetry.log_filter);

    match cli.command {
        Commands::Server(args) => mediabox::api::run(config, args.address).await?,
        Commands::Capabilities => {
            let tools = config.tools.clone();
            let snapshot =
                tokio::task::spawn_blocking(move || CapabilitySnapshot::detect(&tools)).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}
