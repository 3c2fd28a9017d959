// Root module exports
pub mod battery;
pub mod clock;
pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod service;

// Re-export common items for convenience
pub use battery::{
    receiver_to_stream, BatteryEngine, BatteryEvent, BatteryState, EngineHandle, EventBroker,
    EventFilter, EventType, ThresholdCrossing, ThresholdFlags, ThresholdMonitor,
};

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{BatteryCommand, CommandHandler};
pub use config::{AppConfig, BatteryConfig, ConfigError};
pub use errors::{AppError, RestoreError, ValidationError};
pub use logging::init_logger;
pub use persistence::{JsonFileStore, MemoryStore, PersistedSnapshot, SnapshotWriter, StateStore};
pub use registry::EngineRegistry;
pub use scheduler::TickScheduler;
pub use service::BatteryService;
