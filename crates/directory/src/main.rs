//! # directoryctl
//!
//! Administration CLI for the bastion directory.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use common::config::ConfigValidation;
use common::journal::init_journal;
use std::sync::Arc;
use tracing::{info, warn};

use directory::cli::{handlers, Cli, Commands, ConfigCommand};
use directory::{Directory, DirectoryConfig, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Sample config must work even when the current config does not load
    if let Commands::Config {
        config_cmd: ConfigCommand::Sample,
    } = &cli.command
    {
        println!("{}", DirectoryConfig::sample_toml()?);
        return Ok(());
    }

    let mut config =
        DirectoryConfig::load(cli.config.clone()).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_journal(&config.logging).map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    // `migrate` reports what it applied, so it runs them itself
    if matches!(cli.command, Commands::Migrate) {
        config.database.run_migrations = false;
    }

    let store = SqliteStore::new(&config.database)
        .await
        .context("Failed to open directory database")?;
    let directory =
        Directory::new(Arc::new(store)).with_default_port(config.directory.default_port);

    if config.directory.seed_demo && !matches!(cli.command, Commands::Migrate) {
        let seeded = directory.seed_demo().await.context("Failed to seed demo hosts")?;
        info!("Seeded {} demo hosts", seeded.len());
    }

    let result = handlers::handle_command(cli.command, &directory, &config, cli.output).await;
    directory.store().connection().pool().close().await;
    result
}
