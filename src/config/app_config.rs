//! Application configuration: tick cadence, logging and battery definitions

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default discharge window in days
pub const DEFAULT_DISCHARGE_DAYS: u32 = 30;

/// Minimum discharge window in days
pub const MIN_DISCHARGE_DAYS: u32 = 1;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation
    #[error("Invalid value for {0}: {1}")]
    ValidationFailed(String, String),

    /// The config file could not be read or written
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file could not be parsed
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Log verbosity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to the log crate's filter
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for one virtual battery entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryConfig {
    /// Unique display name; doubles as the entity id
    pub name: String,

    /// Days to decay from 100% to 0%
    #[serde(default = "default_discharge_days")]
    pub discharge_days: u32,
}

fn default_discharge_days() -> u32 {
    DEFAULT_DISCHARGE_DAYS
}

impl BatteryConfig {
    pub fn new(name: impl Into<String>, discharge_days: u32) -> Self {
        Self {
            name: name.into(),
            discharge_days,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Recompute cadence for all batteries
    #[serde(default = "default_tick_interval")]
    pub tick_interval: Duration,

    /// Log verbosity
    #[serde(default)]
    pub log_level: LogLevel,

    /// Configured batteries
    #[serde(default)]
    pub batteries: Vec<BatteryConfig>,
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            log_level: LogLevel::default(),
            batteries: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Validate all fields, reporting the first offending one
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval < Duration::from_secs(1) {
            return Err(ConfigError::ValidationFailed(
                "tick_interval".to_string(),
                "must be at least 1 second".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for battery in &self.batteries {
            if battery.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "batteries.name".to_string(),
                    "must not be empty".to_string(),
                ));
            }
            if !seen.insert(battery.name.as_str()) {
                return Err(ConfigError::ValidationFailed(
                    "batteries.name".to_string(),
                    format!("duplicate name: {}", battery.name),
                ));
            }
            if battery.discharge_days < MIN_DISCHARGE_DAYS {
                return Err(ConfigError::ValidationFailed(
                    "batteries.discharge_days".to_string(),
                    format!("must be at least {}", MIN_DISCHARGE_DAYS),
                ));
            }
        }

        Ok(())
    }

    /// Load configuration from a file, returning the default when missing
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&default_config_path())
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|config_dir| config_dir.join("virtual-battery").join("config.json"))
        .unwrap_or_else(|| PathBuf::from("config.json")) // Fallback to current directory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.batteries.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_discharge_days() {
        let mut config = AppConfig::default();
        config.batteries.push(BatteryConfig::new("Smoke Sensor", 0));

        match config.validate() {
            Err(ConfigError::ValidationFailed(field, _)) => {
                assert_eq!(field, "batteries.discharge_days");
            }
            other => panic!("Expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_duplicate_names() {
        let mut config = AppConfig::default();
        config.batteries.push(BatteryConfig::new("Sensor", 30));
        config.batteries.push(BatteryConfig::new("Sensor", 60));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(field, _)) if field == "batteries.name"
        ));
    }

    #[test]
    fn test_config_save_load_round_trip() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.tick_interval = Duration::from_secs(30);
        config.log_level = LogLevel::Debug;
        config.batteries.push(BatteryConfig::new("Kitchen Sensor", 45));

        config.save_to_path(&config_path).expect("Failed to save configuration");
        let loaded = AppConfig::load_from_path(&config_path).expect("Failed to load configuration");

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_default_when_missing() {
        let path = std::path::PathBuf::from("/non/existent/path/config.json");
        let config = AppConfig::load_from_path(&path).expect("missing file should yield defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_discharge_days_defaults_on_deserialize() {
        let json = r#"{"batteries": [{"name": "Sensor"}]}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.batteries[0].discharge_days, DEFAULT_DISCHARGE_DAYS);
        assert_eq!(config.tick_interval, Duration::from_secs(60));
    }
}
