//! Simulator configuration.
//!
//! ## Serde Defaults
//!
//! Every section is `#[serde(default)]`, so a config file only needs
//! the keys it wants to change:
//!
//! ```toml
//! [session]
//! debounce_ms = 300
//!
//! [keyboard.bindings]
//! "ctrl+shift+t" = "toc"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timers and level sequencing
    pub session: SessionConfig,

    /// Paper dimensions in pixels
    pub page: PageConfig,

    /// Zoom limits
    pub zoom: ZoomConfig,

    /// Margin presets and wrap clearance
    pub margins: MarginConfig,

    /// Defaults for newly inserted objects
    pub floating: FloatingConfig,

    /// Keyboard settings
    pub keyboard: KeyboardConfig,
}

impl Config {
    /// Loads config from the default location.
    pub fn load() -> Self {
        Self::load_from_default_path().unwrap_or_else(|err| {
            tracing::warn!("Falling back to default config: {}", err);
            Self::default()
        })
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that cannot work and pulls the rest into range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.zoom.validate()
    }

    /// Loads from the default config path.
    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("layout-doctor").join("config.toml"))
    }

    /// Saves the config to a file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Timers and level sequencing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period before the success check runs
    pub debounce_ms: u64,

    /// Seconds shown on the success overlay before advancing
    pub countdown_secs: u8,

    /// Level index to start from
    pub start_level: usize,

    /// Points awarded per solved level
    pub points_per_level: u32,
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            countdown_secs: 3,
            start_level: 0,
            points_per_level: 100,
        }
    }
}

/// A4 at 96 dpi.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub width: f64,
    pub height: f64,
    /// Visible gap between stacked pages
    pub gap: f64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width: 794.0,
            height: 1123.0,
            gap: 20.0,
        }
    }
}

/// Zoom limits in percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: u16,
    pub max: u16,
    pub step: u16,
    pub initial: u16,
}

impl ZoomConfig {
    /// `min <= max` and a non-zero step; `initial` is clamped into range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidZoom(format!(
                "min {} is above max {}",
                self.min, self.max
            )));
        }
        if self.step == 0 {
            return Err(ConfigError::InvalidZoom("step must be positive".to_string()));
        }
        self.initial = self.initial.clamp(self.min, self.max);
        Ok(())
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 50,
            max: 200,
            step: 10,
            initial: 100,
        }
    }
}

/// Base padding per margin preset plus the clearance kept around wrapped objects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginConfig {
    pub narrow: f64,
    pub normal: f64,
    pub wide: f64,
    pub wrap_clearance: f64,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            narrow: 20.0,
            normal: 50.0,
            wide: 80.0,
            wrap_clearance: 10.0,
        }
    }
}

/// Placement of freshly inserted objects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatingConfig {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for FloatingConfig {
    fn default() -> Self {
        Self {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 150.0,
        }
    }
}

/// Keyboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Extra bindings, chord to command name
    pub bindings: HashMap<String, String>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid zoom settings: {0}")]
    InvalidZoom(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.debounce_ms, 500);
        assert_eq!(config.session.countdown_secs, 3);
        assert_eq!(config.zoom.min, 50);
        assert_eq!(config.page.height, 1123.0);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str("[margins]\nnarrow = 15.0\n").unwrap();
        assert_eq!(config.margins.narrow, 15.0);
        assert_eq!(config.margins.normal, 50.0);
        assert_eq!(config.session.debounce_ms, 500);
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.session.debounce_ms = 250;
        config
            .keyboard
            .bindings
            .insert("ctrl+shift+t".to_string(), "toc".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.session.debounce_ms, 250);
        assert_eq!(loaded.keyboard.bindings["ctrl+shift+t"], "toc");
    }

    #[test]
    fn test_inverted_zoom_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[zoom]\nmin = 150\nmax = 100\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::InvalidZoom(_))));

        let mut config = Config::default();
        config.zoom.step = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidZoom(_))));
    }

    #[test]
    fn test_initial_zoom_is_pulled_into_range() {
        let mut config: Config = toml::from_str("[zoom]\nmin = 120\nmax = 180\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.zoom.initial, 120);
    }
}
