//! glasslink CLI entry point

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use glasslink_cli::{
    cli::{Cli, Commands},
    commands::CommandDispatcher,
    config::AppConfig,
    error::{CliError, Result},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    if let Commands::InitConfig { force } = cli.command {
        return write_default_config(&cli, force);
    }

    // Load configuration
    let mut config = load_configuration(&cli)?;
    if let Some(filter) = &cli.filter {
        config.ble.search_filter = Some(filter.clone());
    }

    if let Err(e) = CommandDispatcher::execute(cli, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Setup logging; `RUST_LOG` wins over `--verbose`
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        AppConfig::load_from_file(config_path)
    } else {
        AppConfig::load_default()
    }
}

fn write_default_config(cli: &Cli, force: bool) -> Result<()> {
    let path = match &cli.config {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()
            .ok_or_else(|| CliError::Config("No platform config directory".into()))?,
    };
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists, pass --force to overwrite",
            path.display()
        )));
    }
    AppConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
