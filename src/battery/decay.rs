//! Pure decay arithmetic for the virtual battery
//!
//! Every function here maps (state fields, now) to a value without touching
//! any shared state. The authoritative level is always re-derived from the
//! elapsed time since the last reset, never accumulated per tick, so missed
//! ticks cannot introduce drift.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Minutes in a full discharge window for the given number of days
fn discharge_window_minutes(discharge_days: u32) -> f64 {
    (discharge_days as f64) * 24.0 * 60.0
}

/// Replace a non-finite value with a safe default
///
/// NaN or infinite intermediates must never reach observable state; the
/// caller logs the substitution.
pub fn sanitize(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

/// Compute the current battery level from the time elapsed since `last_reset`
///
/// Negative elapsed time (clock moved backward) is clamped to zero, so the
/// result is the level as of `last_reset` itself. The result is always within
/// [0, 100].
pub fn compute_level(last_reset: DateTime<Utc>, discharge_days: u32, now: DateTime<Utc>) -> f64 {
    let elapsed_minutes = (now - last_reset).num_seconds().max(0) as f64 / 60.0;

    let total_discharge = sanitize(
        elapsed_minutes / discharge_window_minutes(discharge_days) * 100.0,
        0.0,
    );

    (100.0 - total_discharge).clamp(0.0, 100.0)
}

/// Diagnostic discharge rate for one tick interval, in percent
///
/// Display-only: the level computation never integrates this value.
pub fn discharge_per_tick(discharge_days: u32, tick_interval: Duration) -> f64 {
    let interval_minutes = tick_interval.as_secs_f64() / 60.0;
    100.0 / discharge_window_minutes(discharge_days) * interval_minutes
}

/// Days elapsed since the last reset, clamped at zero
pub fn time_since_reset(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed_seconds = (now - last_reset).num_seconds().max(0) as f64;
    elapsed_seconds / 86_400.0
}

/// Estimated days until the battery reaches zero at the current slope
pub fn time_until_empty(level: f64, discharge_days: u32) -> f64 {
    if level <= 0.0 {
        return 0.0;
    }

    (level / 100.0) * discharge_days as f64
}

/// Minutes of decay needed to drop `pct` percent at the given slope
///
/// Used to re-base `last_reset` after a manual level override.
pub fn minutes_for_discharge(pct: f64, discharge_days: u32) -> f64 {
    (pct / 100.0) * discharge_window_minutes(discharge_days)
}
