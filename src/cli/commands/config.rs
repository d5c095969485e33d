//! Config command implementation.

use super::load_config;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate configuration file.
    Validate,
    /// Print configuration with defaults filled in.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Run the config command.
pub fn run_config(config_path: Option<&Path>, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(config_path),
        ConfigCommand::Show { format } => {
            println!("{}", render_config(config_path, &format)?);
            Ok(())
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    println!("✓ Configuration is valid");
    println!("  default_ttl_ms    = {}", config.registry.default_ttl_ms);
    println!("  washout_period_ms = {}", config.registry.washout_period_ms);
    println!("  store.backend     = {}", config.store.backend);
    Ok(())
}

fn render_config(path: Option<&Path>, format: &str) -> Result<String> {
    let config = load_config(path)?;
    match format {
        "json" => Ok(serde_json::to_string_pretty(&config)?),
        "toml" => config.to_toml(),
        other => anyhow::bail!("unknown format {:?}; expected toml or json", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_render_fills_defaults() {
        let file = config_file("[registry]\nwashout_period_ms = 5000\n");
        let rendered = render_config(Some(file.path()), "toml").unwrap();
        assert!(rendered.contains("washout_period_ms = 5000"));
        assert!(rendered.contains("default_ttl_ms = 12000"));
    }

    #[test]
    fn test_render_json() {
        let file = config_file("");
        let rendered = render_config(Some(file.path()), "json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["store"]["backend"], "memory");
    }

    #[test]
    fn test_render_rejects_unknown_format() {
        let file = config_file("");
        assert!(render_config(Some(file.path()), "yaml").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_backend() {
        let file = config_file("[store]\nbackend = \"couchbase\"\n");
        assert!(validate_config(Some(file.path())).is_err());
    }
}
