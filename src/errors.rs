//! Error types for the virtual battery engine

use std::error::Error;
use std::fmt;

use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Command validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State restore error
    #[error("Restore error: {0}")]
    Restore(String),

    /// Persistence error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

impl From<String> for AppError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// Command validation error
///
/// Surfaced to the caller at the service boundary; engine state is unchanged
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Battery level outside [0, 100]
    LevelOutOfRange(i64),

    /// Discharge days below the minimum of 1
    DischargeDaysOutOfRange(i64),

    /// Missing or empty entity id
    MissingEntityId,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LevelOutOfRange(value) => {
                write!(f, "battery_level must be within 0..=100, got {}", value)
            }
            Self::DischargeDaysOutOfRange(value) => {
                write!(f, "discharge_days must be at least 1, got {}", value)
            }
            Self::MissingEntityId => write!(f, "entity_id must not be empty"),
        }
    }
}

impl Error for ValidationError {}

/// State restore error
///
/// Never propagated out of the engine: every variant degrades to a recomputed
/// or factory-default state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    /// A required attribute is missing from the snapshot
    MissingAttribute(&'static str),

    /// A timestamp attribute failed to parse
    InvalidTimestamp(String),

    /// A numeric attribute or the state value failed to parse
    InvalidNumber(String),

    /// The state value parsed but is not a finite number
    NonFiniteValue,
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAttribute(name) => write!(f, "missing attribute: {}", name),
            Self::InvalidTimestamp(value) => write!(f, "invalid timestamp: {}", value),
            Self::InvalidNumber(value) => write!(f, "invalid number: {}", value),
            Self::NonFiniteValue => write!(f, "value is not finite"),
        }
    }
}

impl Error for RestoreError {}

impl From<RestoreError> for AppError {
    fn from(err: RestoreError) -> Self {
        Self::Restore(err.to_string())
    }
}
