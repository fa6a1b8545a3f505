mod cli;
mod commands;

use anyhow::{Context, Result};
use cli::{Command, USAGE};
use toolgate_core::GatewayConfig;
use toolgate_pii::TokenizationEngine;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("toolgate=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::parse_args(std::env::args().skip(1))?;
    if cli.command == Command::Help {
        print!("{}", USAGE);
        return Ok(());
    }

    let config = GatewayConfig::load_or_default(&cli.config_path)
        .with_context(|| format!("Failed to load config from {}", cli.config_path.display()))?;

    match cli.command {
        Command::Discover => commands::tools::discover(&config.registry).await,
        Command::List => commands::tools::list(&config.registry).await,
        Command::Search(query) => commands::tools::search(&config.registry, &query).await,
        Command::Summary(name) => commands::tools::summary(&config.registry, &name).await,
        Command::Schema(name) => commands::tools::schema(&config.registry, &name).await,
        Command::Scan(path) => {
            let engine = TokenizationEngine::with_config(config.pii);
            commands::scan::run(&engine, &path).await
        }
        Command::Report(path) => commands::report::run(&config.telemetry, &path).await,
        Command::Help => Ok(()),
    }
}
