//! Threshold crossing detection for battery levels

use crate::battery::state::ThresholdFlags;
use crate::battery::{BATTERY_LEVEL_CHARGING, BATTERY_LEVEL_CRITICAL, BATTERY_LEVEL_LOW};

/// A boundary the level crossed during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdCrossing {
    /// Level dropped below 20%
    Low,

    /// Level dropped below 10%
    Critical,

    /// Level reached 95% or above
    Full,
}

/// Per-battery state machine comparing consecutive levels against the fixed
/// boundaries (low 20, critical 10, full 95)
///
/// Each boundary fires at most once per crossing: while the level stays inside
/// a crossed region, repeated ticks produce nothing. Recovery out of the
/// low/critical region and dropping back out of the full region clear the
/// flags silently.
#[derive(Debug, Clone, Default)]
pub struct ThresholdMonitor {
    flags: ThresholdFlags,
}

impl ThresholdMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the flags from a restored level without emitting anything
    ///
    /// Called once after state restore so that the first real tick compares
    /// against accurate flags instead of a synthetic previous level.
    pub fn seed(&mut self, level: f64) {
        self.flags = ThresholdFlags::from_level(level);
    }

    /// Current flag snapshot
    pub fn flags(&self) -> ThresholdFlags {
        self.flags
    }

    /// Compare a previous and new level, returning the crossings that fired
    pub fn observe(&mut self, previous: f64, new: f64) -> Vec<ThresholdCrossing> {
        let mut crossings = Vec::new();

        // Full battery (crossing 95% upward)
        if previous < BATTERY_LEVEL_CHARGING && new >= BATTERY_LEVEL_CHARGING {
            self.flags.full = true;
            crossings.push(ThresholdCrossing::Full);
        } else if previous >= BATTERY_LEVEL_CHARGING && new < BATTERY_LEVEL_CHARGING {
            self.flags.full = false;
        }

        // Low battery (crossing 20% downward)
        if previous >= BATTERY_LEVEL_LOW && new < BATTERY_LEVEL_LOW {
            self.flags.low = true;
            crossings.push(ThresholdCrossing::Low);
        } else if previous < BATTERY_LEVEL_LOW && new >= BATTERY_LEVEL_LOW {
            self.flags.low = false;
        }

        // Critical battery (crossing 10% downward)
        if previous >= BATTERY_LEVEL_CRITICAL && new < BATTERY_LEVEL_CRITICAL {
            self.flags.critical = true;
            crossings.push(ThresholdCrossing::Critical);
        } else if previous < BATTERY_LEVEL_CRITICAL && new >= BATTERY_LEVEL_CRITICAL {
            self.flags.critical = false;
        }

        crossings
    }
}
