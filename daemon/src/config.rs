use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::buffer::parse_hex_color;
use crate::validate_enum;

/// Optional tunables, read from `<config dir>/vidpaper/config.toml`.
///
/// The file is never written; a missing file means defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// How often stalled players are checked
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_ms: u64,

    /// Upper bound for reading media metadata at startup
    #[serde(default = "default_validation_timeout")]
    pub validation_timeout_secs: u64,

    /// Hold an idle/sleep inhibitor while playing
    #[serde(default = "default_true")]
    pub prevent_idle_sleep: bool,

    /// Painted on each surface until its first frame is decoded
    #[serde(default = "default_background_color")]
    pub background_color: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: default_watchdog_interval(),
            validation_timeout_secs: default_validation_timeout(),
            prevent_idle_sleep: true,
            background_color: default_background_color(),
        }
    }
}

fn default_watchdog_interval() -> u64 {
    1000
}
fn default_validation_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_background_color() -> String {
    "#000000".to_string()
}

impl PlaybackSettings {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    /// Background colour as RGBA; validated on load
    pub fn background_rgba(&self) -> (u8, u8, u8, u8) {
        parse_hex_color(&self.background_color).unwrap_or((0, 0, 0, 255))
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("vidpaper");

        Ok(config_dir.join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)?;

        let playback = &self.playback;
        if !(100..=60_000).contains(&playback.watchdog_interval_ms) {
            anyhow::bail!(
                "Invalid watchdog_interval_ms: {} (must be 100-60000)",
                playback.watchdog_interval_ms
            );
        }
        if !(1..=300).contains(&playback.validation_timeout_secs) {
            anyhow::bail!(
                "Invalid validation_timeout_secs: {} (must be 1-300)",
                playback.validation_timeout_secs
            );
        }
        if parse_hex_color(&playback.background_color).is_none() {
            anyhow::bail!("Invalid background_color: {}", playback.background_color);
        }

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }
}
