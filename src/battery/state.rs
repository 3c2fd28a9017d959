//! Battery state data model

use chrono::{DateTime, Utc};

use crate::battery::{BATTERY_LEVEL_CHARGING, BATTERY_LEVEL_CRITICAL, BATTERY_LEVEL_LOW};

/// Threshold flags tracking which crossed regions are currently active
///
/// Transient per-process state: flags are never persisted. On restore they are
/// re-seeded from the restored level so the first tick comparison is accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdFlags {
    /// Level is below the low threshold (20%)
    pub low: bool,

    /// Level is below the critical threshold (10%)
    pub critical: bool,

    /// Level is at or above the full threshold (95%)
    pub full: bool,
}

impl ThresholdFlags {
    /// Derive flags directly from a level, without any event emission
    pub fn from_level(level: f64) -> Self {
        Self {
            low: level < BATTERY_LEVEL_LOW,
            critical: level < BATTERY_LEVEL_CRITICAL,
            full: level >= BATTERY_LEVEL_CHARGING,
        }
    }
}

impl Default for ThresholdFlags {
    fn default() -> Self {
        // A freshly created battery starts at full charge
        Self::from_level(100.0)
    }
}

/// State of a single virtual battery instance
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryState {
    /// Current charge percentage, always clamped to [0, 100]
    pub level: f64,

    /// Origin instant from which decay is computed
    pub last_reset: DateTime<Utc>,

    /// Timestamp of the most recent recompute
    pub last_update: DateTime<Utc>,

    /// Days to decay from 100% to 0%, at least 1
    pub discharge_days: u32,
}

impl BatteryState {
    /// Create a fresh state at full charge
    pub fn new(discharge_days: u32, now: DateTime<Utc>) -> Self {
        Self {
            level: 100.0,
            last_reset: now,
            last_update: now,
            discharge_days,
        }
    }

    /// Store a level, clamping it into the valid range
    pub fn set_level_clamped(&mut self, level: f64) {
        self.level = level.clamp(0.0, 100.0);
    }

    /// The level as exposed to observers, rounded to two decimals
    pub fn rounded_level(&self) -> f64 {
        (self.level * 100.0).round() / 100.0
    }
}
