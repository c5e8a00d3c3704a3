//! SMS relay CLI entry point

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use smsrelay_cli::{
    app::RelayApp,
    cli::{Cli, Commands},
    commands::CommandDispatcher,
    config::AppConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    // Printing the example must work without a readable config or data dir
    if cli.command == Commands::ExampleConfig {
        print!("{}", AppConfig::example_config()?);
        return Ok(());
    }

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => AppConfig::default_data_dir()?,
    };
    debug!(data_dir = %data_dir.display(), "Using data directory");

    let app = RelayApp::open(config, &data_dir)
        .with_context(|| format!("Failed to open state in {}", data_dir.display()))?;

    if let Err(e) = CommandDispatcher::execute(cli.command, app).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging based on verbosity level; `RUST_LOG` takes precedence
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
