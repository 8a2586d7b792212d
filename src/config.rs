//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! complication-config.toml file. Every section and field is optional; anything
//! missing takes its default, and an unreadable or invalid file falls back to
//! the full default configuration.

use crate::assets::{DEFAULT_GLYPH_SIZE, MAX_GLYPH_SIZE, MIN_GLYPH_SIZE};
use crate::lunar::MoonPhaseReference;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "complication-config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config encode: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Application configuration loaded from complication-config.toml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub moon: MoonConfig,
    pub heart_rate: HeartRateConfig,
    pub assets: AssetConfig,
    pub simulator: SimulatorConfig,
}

/// Moon-phase complication settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MoonConfig {
    /// Period of the re-render timer while active
    pub refresh_interval_ms: u64,
    /// Read the reference new moon as UTC instead of local wall-clock time
    pub reference_in_utc: bool,
    /// Editor preview text
    pub preview_text: String,
}

/// Heart-rate complication settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartRateConfig {
    /// Gauge lower bound for the ranged-value view
    pub ranged_min: f32,
    /// Gauge upper bound for the ranged-value view
    pub ranged_max: f32,
    /// Editor preview text
    pub preview_text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Edge length of the built-in glyphs in pixels
    pub glyph_size: u32,
}

/// Synthetic sensor used when running off-device
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub baseline_bpm: f64,
    pub sample_interval_ms: u64,
}

impl Default for MoonConfig {
    fn default() -> Self {
        MoonConfig {
            refresh_interval_ms: 2_000,
            reference_in_utc: false,
            preview_text: "6?".to_string(),
        }
    }
}

impl MoonConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn reference(&self) -> MoonPhaseReference {
        if self.reference_in_utc {
            MoonPhaseReference::utc()
        } else {
            MoonPhaseReference::local()
        }
    }
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        HeartRateConfig {
            ranged_min: 50.0,
            ranged_max: 130.0,
            preview_text: "6?".to_string(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        AssetConfig {
            glyph_size: DEFAULT_GLYPH_SIZE,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            baseline_bpm: 72.0,
            sample_interval_ms: 1_000,
        }
    }
}

impl SimulatorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Config {
    /// Load configuration from complication-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(config) => {
                info!("loaded configuration from {}", path.display());
                config
            }
            Err(ConfigError::Io(_)) => {
                info!("no config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("{} ignored: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn try_load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.moon.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "moon.refresh_interval_ms must be positive".to_string(),
            ));
        }
        if self.heart_rate.ranged_min >= self.heart_rate.ranged_max {
            return Err(ConfigError::Invalid(format!(
                "heart_rate.ranged_min ({}) must be below ranged_max ({})",
                self.heart_rate.ranged_min, self.heart_rate.ranged_max
            )));
        }
        if !(MIN_GLYPH_SIZE..=MAX_GLYPH_SIZE).contains(&self.assets.glyph_size) {
            return Err(ConfigError::Invalid(format!(
                "assets.glyph_size ({}) must be within {}..={}",
                self.assets.glyph_size, MIN_GLYPH_SIZE, MAX_GLYPH_SIZE
            )));
        }
        if self.simulator.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "simulator.sample_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Save current configuration to `path`
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}
