//! Configuration parsing and validation.
//!
//! Trellis configuration is loaded from a TOML file with CLI overrides.
//! Every section is optional and falls back to its defaults.

use crate::registry::extension::EXTENSION_MARKER;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Lease and washout settings handed to the registry.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Backing store selection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Registry settings.
///
/// Immutable once the registry is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Lease length granted to a node on registration and on each heartbeat.
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// How long the washout copy outlives the primary record.
    #[serde(default = "default_washout_period_ms")]
    pub washout_period_ms: u64,

    /// Extension field renames applied before metadata is written.
    #[serde(default = "default_legacy_keys")]
    pub legacy_keys: BTreeMap<String, String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_ttl_ms(),
            washout_period_ms: default_washout_period_ms(),
            legacy_keys: default_legacy_keys(),
        }
    }
}

impl RegistryConfig {
    /// Default lease length.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Washout grace period.
    pub fn washout_period(&self) -> Duration {
        Duration::from_millis(self.washout_period_ms)
    }
}

/// Backing store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend name. Only "memory" ships with the crate.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// How often the in-memory backend evicts expired records.
    #[serde(default = "default_sweep_period_ms")]
    pub sweep_period_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sweep_period_ms: default_sweep_period_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_ttl_ms() -> u64 {
    12_000
}

fn default_washout_period_ms() -> u64 {
    30_000
}

fn default_legacy_keys() -> BTreeMap<String, String> {
    BTreeMap::from([("@_apiversion".to_string(), "api_version".to_string())])
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_sweep_period_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ttl) = overrides.default_ttl_ms {
            self.registry.default_ttl_ms = ttl;
        }
        if let Some(washout) = overrides.washout_period_ms {
            self.registry.washout_period_ms = washout;
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_registry()?;
        self.validate_store()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_registry(&self) -> Result<()> {
        if self.registry.default_ttl_ms == 0 {
            anyhow::bail!("registry.default_ttl_ms must be > 0");
        }
        if self.registry.washout_period_ms == 0 {
            anyhow::bail!("registry.washout_period_ms must be > 0");
        }
        for (from, to) in &self.registry.legacy_keys {
            if !from.starts_with(EXTENSION_MARKER) {
                anyhow::bail!(
                    "registry.legacy_keys entry {:?} must start with '{}'",
                    from,
                    EXTENSION_MARKER
                );
            }
            if to.is_empty() {
                anyhow::bail!("registry.legacy_keys entry {:?} maps to an empty name", from);
            }
        }
        Ok(())
    }

    fn validate_store(&self) -> Result<()> {
        if self.store.backend != "memory" {
            anyhow::bail!(
                "store.backend must be 'memory', got: {}",
                self.store.backend
            );
        }
        if self.store.sweep_period_ms == 0 {
            anyhow::bail!("store.sweep_period_ms must be > 0");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override the node lease length.
    pub default_ttl_ms: Option<u64>,
    /// Override the washout period.
    pub washout_period_ms: Option<u64>,
}
