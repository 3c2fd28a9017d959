//! Decay/state engine for a single virtual battery
//!
//! The engine owns a [`BatteryState`] and a [`ThresholdMonitor`] and is the
//! only writer of either. Ticks and commands are delivered as discrete,
//! serialized invocations; shared handles wrap the engine in a mutex, so
//! every operation runs atomically and completes before returning.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::Sender;

use crate::battery::decay;
use crate::battery::events::BatteryEvent;
use crate::battery::state::{BatteryState, ThresholdFlags};
use crate::battery::thresholds::ThresholdMonitor;
use crate::persistence::PersistedSnapshot;

/// Shared handle to an engine, as stored in the registry
pub type EngineHandle = Arc<Mutex<BatteryEngine>>;

/// Decay engine for one configured virtual battery
pub struct BatteryEngine {
    /// Entity id used for event payloads and persistence keys
    entity_id: String,

    /// Owned battery state
    state: BatteryState,

    /// Threshold crossing state machine
    monitor: ThresholdMonitor,

    /// Tick cadence, used only for the diagnostic per-tick rate
    tick_interval: Duration,

    /// Diagnostic discharge rate per tick, in percent
    discharge_per_tick: f64,

    /// Outgoing event channel, if the engine is wired to a broker
    event_sender: Option<Sender<BatteryEvent>>,
}

impl BatteryEngine {
    /// Create a fresh engine at full charge
    pub fn new(
        entity_id: impl Into<String>,
        discharge_days: u32,
        tick_interval: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: BatteryState::new(discharge_days, now),
            monitor: ThresholdMonitor::new(),
            tick_interval,
            discharge_per_tick: decay::discharge_per_tick(discharge_days, tick_interval),
            event_sender: None,
        }
    }

    /// Wire the engine to an event broker sender
    pub fn set_event_sender(&mut self, sender: Sender<BatteryEvent>) {
        self.event_sender = Some(sender);
    }

    /// Attach a restored snapshot, falling back to recomputed values where the
    /// snapshot is incomplete
    ///
    /// The fallback ladder: a complete snapshot restores level and timestamps
    /// verbatim (recomputing the level only when the stored value is
    /// unusable); a snapshot with a recoverable `last_reset` recomputes the
    /// level from elapsed time; anything less keeps factory defaults. Never
    /// returns an error.
    pub fn restore(&mut self, snapshot: Option<&PersistedSnapshot>, now: DateTime<Utc>) {
        let Some(snapshot) = snapshot else {
            log::debug!("No previous state found for {}", self.entity_id);
            return;
        };

        match snapshot.parse_last_reset() {
            Ok(last_reset) => {
                self.state.last_reset = last_reset;
            }
            Err(err) => {
                log::warn!(
                    "Could not restore last_reset for {}: {}; keeping factory state",
                    self.entity_id,
                    err
                );
                return;
            }
        }

        if let Ok(last_update) = snapshot.parse_last_update() {
            self.state.last_update = last_update;
        }

        match snapshot.parse_discharge_days() {
            Ok(days) => self.state.discharge_days = days,
            Err(err) => {
                log::warn!(
                    "Could not restore discharge_days for {}: {}; keeping {}",
                    self.entity_id,
                    err,
                    self.state.discharge_days
                );
            }
        }
        self.discharge_per_tick =
            decay::discharge_per_tick(self.state.discharge_days, self.tick_interval);

        match snapshot.parse_level() {
            Ok(level) => self.state.set_level_clamped(level),
            Err(err) => {
                // Stored value unusable: re-derive from time since reset
                let level = self.recompute_level(now);
                self.state.set_level_clamped(level);
                log::warn!(
                    "Could not restore level for {}: {}; calculated {:.2}",
                    self.entity_id,
                    err,
                    self.state.level
                );
            }
        }

        // Seed flags from the restored level so the first tick comparison is
        // accurate and does not spuriously fire
        self.monitor.seed(self.state.level);

        log::debug!(
            "Restored state for {}: level={:.2}, discharge_days={}, last_reset={}",
            self.entity_id,
            self.state.level,
            self.state.discharge_days,
            self.state.last_reset.to_rfc3339()
        );
    }

    /// Recompute the level, re-basing `last_reset` on clock skew
    fn recompute_level(&mut self, now: DateTime<Utc>) -> f64 {
        if now < self.state.last_reset {
            log::warn!(
                "Detected negative time since reset for {}, adjusting to current time",
                self.entity_id
            );
            self.state.last_reset = now;
        }
        decay::compute_level(self.state.last_reset, self.state.discharge_days, now)
    }

    /// One tick of the engine: recompute the level, compare against the
    /// thresholds, emit crossing events and a state-changed notification
    pub fn advance(&mut self, now: DateTime<Utc>) {
        let previous_level = self.state.level;

        let level = self.recompute_level(now);
        self.state.set_level_clamped(level);
        self.state.last_update = now;

        for crossing in self.monitor.observe(previous_level, self.state.level) {
            self.emit(BatteryEvent::from_crossing(
                crossing,
                &self.entity_id,
                self.state.rounded_level(),
            ));
        }

        if (previous_level - self.state.level).abs() > 1.0 {
            log::debug!(
                "{}: battery level changed from {:.2}% to {:.2}% (discharge days: {}, last reset: {})",
                self.entity_id,
                previous_level,
                self.state.level,
                self.state.discharge_days,
                self.state.last_reset.to_rfc3339()
            );
        }

        self.notify_state_changed();
    }

    /// Reset the battery to full charge
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.state.level = 100.0;
        self.state.last_reset = now;
        self.state.last_update = now;
        self.monitor.seed(self.state.level);
        self.notify_state_changed();
    }

    /// Override the level, re-basing `last_reset` so decay continues correctly
    ///
    /// Range validation happens at the command boundary; the engine still
    /// clamps defensively. `last_reset` is moved to the synthetic past instant
    /// at which a full battery would have decayed to the requested level.
    pub fn set_level(&mut self, level: f64, now: DateTime<Utc>) {
        self.state.set_level_clamped(level);

        if self.state.level < 100.0 {
            let minutes =
                decay::minutes_for_discharge(100.0 - self.state.level, self.state.discharge_days);
            self.state.last_reset =
                now - chrono::Duration::milliseconds((minutes * 60_000.0) as i64);
        } else {
            self.state.last_reset = now;
        }

        self.state.last_update = now;
        // Manual overrides re-seed the flags without firing entry events
        self.monitor.seed(self.state.level);
        self.notify_state_changed();
    }

    /// Replace the discharge window; level and reset origin are untouched
    pub fn set_discharge_days(&mut self, days: u32, now: DateTime<Utc>) {
        self.state.discharge_days = days;
        self.discharge_per_tick = decay::discharge_per_tick(days, self.tick_interval);
        self.state.last_update = now;
        self.notify_state_changed();
    }

    fn notify_state_changed(&self) {
        self.emit(BatteryEvent::StateChanged {
            entity_id: self.entity_id.clone(),
            battery_level: self.state.rounded_level(),
        });
    }

    fn emit(&self, event: BatteryEvent) {
        if let Some(sender) = &self.event_sender {
            if let Err(err) = sender.try_send(event) {
                log::debug!("Dropped event for {}: {}", self.entity_id, err);
            }
        }
    }

    /// Entity id of this engine
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Current level, rounded to two decimals
    pub fn level(&self) -> f64 {
        self.state.rounded_level()
    }

    /// Days since the last reset, for the derived sensor
    pub fn time_since_reset(&self, now: DateTime<Utc>) -> f64 {
        decay::time_since_reset(self.state.last_reset, now)
    }

    /// Estimated days until empty, for the derived sensor
    pub fn time_until_empty(&self) -> f64 {
        decay::time_until_empty(self.state.level, self.state.discharge_days)
    }

    /// Diagnostic discharge rate per tick, in percent
    pub fn discharge_per_tick(&self) -> f64 {
        self.discharge_per_tick
    }

    /// Configured discharge window in days
    pub fn discharge_days(&self) -> u32 {
        self.state.discharge_days
    }

    /// Origin instant of the current decay slope
    pub fn last_reset(&self) -> DateTime<Utc> {
        self.state.last_reset
    }

    /// Timestamp of the most recent recompute
    pub fn last_update(&self) -> DateTime<Utc> {
        self.state.last_update
    }

    /// Current threshold flags
    pub fn threshold_flags(&self) -> ThresholdFlags {
        self.monitor.flags()
    }

    /// Snapshot of the observable state for the persistence adapter
    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot::from_fields(
            self.state.rounded_level(),
            self.state.discharge_days,
            self.state.last_reset,
            self.state.last_update,
        )
    }

    /// Wrap the engine into a shared handle
    pub fn into_handle(self) -> EngineHandle {
        Arc::new(Mutex::new(self))
    }
}
