//! CLI utilities for binaries
//!
//! Handles configuration path resolution and argument parsing for all
//! binary executables.

use std::path::PathBuf;

/// Which configuration file to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Gateway configuration (config/gateway.yaml)
    Gateway,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Gateway => "config/gateway.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "CONFIG_PATH"
    }
}

/// Load configuration path from environment or use default
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    match config_type {
        ConfigType::Custom(path) => path.into(),
        other => std::env::var(other.env_var_name())
            .unwrap_or_else(|_| other.default_path().to_string())
            .into(),
    }
}

/// Command line arguments, excluding the program name
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Options of the `precache` binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheArgs {
    /// Overrides `precache.days_ahead` when set
    pub days: Option<u32>,
    pub force: bool,
    pub weekend: bool,
}

impl PrecacheArgs {
    /// Parse `--days N`, `--days=N`, `--force` and `--weekend`
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut parsed = PrecacheArgs::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--force" => parsed.force = true,
                "--weekend" => parsed.weekend = true,
                "--days" => {
                    let value = iter.next().ok_or("--days requires a value")?;
                    parsed.days = Some(parse_days(value)?);
                }
                other => match other.strip_prefix("--days=") {
                    Some(value) => parsed.days = Some(parse_days(value)?),
                    None => return Err(format!("Unknown argument: {}", other)),
                },
            }
        }
        Ok(parsed)
    }
}

fn parse_days(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(format!("--days must be a positive integer, got '{}'", value)),
    }
}
