//! Bot settings loading from config.toml
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Secrets (the Discord token, the database URL) come from the environment,
//! not from this file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Whole config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub betting: BettingConfig,
    pub markers: MarkerConfig,
    pub rollup: RollupConfig,
    pub display: DisplayConfig,
}

/// Bet slip policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BettingConfig {
    pub min_units: u8,
    pub max_units: u8,
    /// Idle time before a bet slip expires
    pub session_timeout_secs: u64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_units: 1,
            max_units: 3,
            session_timeout_secs: 300,
        }
    }
}

impl BettingConfig {
    #[must_use]
    pub const fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

/// Reaction emoji that resolve a wager
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub positive: String,
    pub negative: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            positive: "✅".to_string(),
            negative: "❌".to_string(),
        }
    }
}

/// Periodic job cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    pub voice_label_interval_secs: u64,
    pub session_sweep_secs: u64,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            voice_label_interval_secs: 600,
            session_sweep_secs: 60,
        }
    }
}

/// Card presentation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub placeholder_image_url: String,
    /// Name of the webhook the bot creates in bet channels
    pub webhook_name: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            placeholder_image_url: "https://cdn.discordapp.com/embed/avatars/0.png".to_string(),
            webhook_name: "Capper Bot".to_string(),
        }
    }
}

/// Parses config.toml contents and checks the unit bounds make sense.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if config.betting.min_units == 0 || config.betting.min_units > config.betting.max_units {
        return Err(Error::Config {
            message: format!(
                "Invalid unit bounds {}-{}",
                config.betting.min_units, config.betting.max_units
            ),
        });
    }

    Ok(config)
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads `CONFIG_PATH` (default `./config.toml`), falling back to defaults
/// when the file doesn't exist.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        warn!(%path, "Config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let config = load_config(&path)?;
    info!(%path, "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let config = parse_config(
            r#"
            [betting]
            session_timeout_secs = 120

            [markers]
            positive = "👍"
        "#,
        )
        .unwrap();

        assert_eq!(config.betting.session_timeout_secs, 120);
        assert_eq!(config.betting.max_units, 3);
        assert_eq!(config.markers.positive, "👍");
        assert_eq!(config.markers.negative, "❌");
        assert_eq!(config.rollup.voice_label_interval_secs, 600);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config.betting.min_units, 1);
        assert_eq!(config.display.webhook_name, "Capper Bot");
    }

    #[test]
    fn test_rejects_inverted_unit_bounds() {
        let result = parse_config(
            r"
            [betting]
            min_units = 3
            max_units = 1
        ",
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
