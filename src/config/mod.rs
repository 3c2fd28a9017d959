//! Settings management

mod app_config;

pub use app_config::{
    default_config_path, AppConfig, BatteryConfig, ConfigError, LogLevel, DEFAULT_DISCHARGE_DAYS,
    MIN_DISCHARGE_DAYS,
};
