//! sdcli - Platform and Geometry Backend automation
//!
//! Resolves configuration (CLI → ENV → TOML → defaults), installs logging,
//! authenticates once and runs a single command.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use sdcli::cli::{Cli, Command};
use sdcli::services::PlatformBackend;
use sdcli::{commands, CliContext};
use sdcli_common::config::{config_file_path, load_toml_config, resolve_with_toml, TomlConfig};
use sdcli_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    let toml_config = match config_file_path(overrides.config_path.as_deref()) {
        Some(path) => load_toml_config(&path).context("Failed to load config file")?,
        None => TomlConfig::default(),
    };

    init_logging(&toml_config.logging).context("Failed to initialize logging")?;

    info!(
        "sdcli v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Reading a container needs no credentials
    if let Command::ParseSdtf(args) = &cli.command {
        commands::parse_sdtf(args).await?;
        return Ok(());
    }

    let config = resolve_with_toml(&overrides, toml_config)?;
    let ctx = CliContext::init(config)
        .await
        .context("Failed to authenticate with the Platform Backend")?;
    info!(user_id = %ctx.platform.authenticated_user_id(), "Authenticated");

    if let Err(e) = commands::run(&ctx, cli.command).await {
        error!(error = %e, "Command failed");
        return Err(e.into());
    }
    Ok(())
}
