//! CLI command implementations.

mod config;
mod start;

pub use config::{run_config, ConfigArgs, ConfigCommand};
pub use start::{run_start, StartArgs};

use crate::core::config::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/trellis.toml";

/// Load the configuration named on the command line.
///
/// Without an explicit path the default location is read if it exists,
/// otherwise built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Config::from_file(default)
                    .with_context(|| format!("failed to load config from {}", default.display()))
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[registry]\ndefault_ttl_ms = 4000").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.registry.default_ttl_ms, 4000);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load config"));
    }
}
