//! Battery decay engine and event system

pub mod decay;
mod engine;
mod state;
mod thresholds;
pub mod events;

pub use engine::{BatteryEngine, EngineHandle};
pub use state::{BatteryState, ThresholdFlags};
pub use thresholds::{ThresholdCrossing, ThresholdMonitor};

pub use events::{
    receiver_to_stream, BatteryEvent, EventBroker, EventFilter, EventType, SubscriberId,
};

/// Low battery threshold (percentage)
pub const BATTERY_LEVEL_LOW: f64 = 20.0;

/// Critical battery threshold (percentage)
pub const BATTERY_LEVEL_CRITICAL: f64 = 10.0;

/// Level at which the battery is considered full again (percentage)
pub const BATTERY_LEVEL_CHARGING: f64 = 95.0;
