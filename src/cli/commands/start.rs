//! Start command implementation.

use super::load_config;
use crate::core::config::ConfigOverrides;
use crate::core::runtime::Runtime;
use anyhow::Result;
use clap::Args;
use std::path::Path;

/// Start the registry.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Override the node lease length in milliseconds.
    #[arg(long)]
    pub default_ttl_ms: Option<u64>,

    /// Override the washout period in milliseconds.
    #[arg(long)]
    pub washout_period_ms: Option<u64>,
}

/// Initialize tracing subscriber if the telemetry feature is enabled.
///
/// `RUST_LOG` wins over the configured level when set.
#[cfg(feature = "telemetry")]
fn init_tracing(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(_log_level: &str) {}

/// Run the start command.
pub async fn run_start(
    config_path: Option<&Path>,
    mut overrides: ConfigOverrides,
    args: StartArgs,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    overrides.default_ttl_ms = overrides.default_ttl_ms.or(args.default_ttl_ms);
    overrides.washout_period_ms = overrides.washout_period_ms.or(args.washout_period_ms);
    config.apply_overrides(&overrides);

    init_tracing(&config.telemetry.log_level);

    let mut runtime = Runtime::new(config)?;
    runtime.run().await
}
