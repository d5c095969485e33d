//! Trellis - unified CLI entrypoint.
//!
//! Usage:
//!   trellis start --config config/trellis.toml
//!   trellis config validate --config config/trellis.toml
//!   trellis config show --config config/trellis.toml --format json

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use trellis::cli::commands::{run_config, run_start};
use trellis::cli::{Cli, Commands};
use trellis::config::ConfigOverrides;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.map(PathBuf::from);
    let overrides = ConfigOverrides {
        log_level: cli.log_level,
        ..ConfigOverrides::default()
    };

    match cli.command {
        Commands::Start(args) => run_start(config_path.as_deref(), overrides, args).await,
        Commands::Config(args) => run_config(config_path.as_deref(), args),
    }
}
