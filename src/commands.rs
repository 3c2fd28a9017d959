//! Command dispatch for battery engines
//!
//! Validation happens here, at the caller-facing boundary: by the time an
//! operation reaches an engine, its arguments are known good. A command for an
//! unknown entity id is a logged no-op, not an error.

use std::sync::Arc;

use crate::clock::Clock;
use crate::errors::ValidationError;
use crate::registry::EngineRegistry;

/// An external command targeting one battery engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatteryCommand {
    /// Reset the battery to 100%
    ResetBatteryLevel { entity_id: String },

    /// Override the battery level
    SetBatteryLevel { entity_id: String, battery_level: i64 },

    /// Replace the discharge window
    SetDischargeDays { entity_id: String, discharge_days: i64 },
}

impl BatteryCommand {
    /// The entity id this command targets
    pub fn entity_id(&self) -> &str {
        match self {
            Self::ResetBatteryLevel { entity_id }
            | Self::SetBatteryLevel { entity_id, .. }
            | Self::SetDischargeDays { entity_id, .. } => entity_id,
        }
    }

    /// Validate the command arguments without touching any engine
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entity_id().is_empty() {
            return Err(ValidationError::MissingEntityId);
        }

        match *self {
            Self::ResetBatteryLevel { .. } => Ok(()),
            Self::SetBatteryLevel { battery_level, .. } => {
                if (0..=100).contains(&battery_level) {
                    Ok(())
                } else {
                    Err(ValidationError::LevelOutOfRange(battery_level))
                }
            }
            Self::SetDischargeDays { discharge_days, .. } => {
                if discharge_days >= 1 {
                    Ok(())
                } else {
                    Err(ValidationError::DischargeDaysOutOfRange(discharge_days))
                }
            }
        }
    }
}

/// Routes validated commands to the matching engine
pub struct CommandHandler {
    registry: EngineRegistry,
    clock: Arc<dyn Clock>,
}

impl CommandHandler {
    /// Create a handler over an explicit registry and clock
    pub fn new(registry: EngineRegistry, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    /// Validate and apply a command
    ///
    /// Returns a [`ValidationError`] for malformed input; an unknown entity id
    /// is logged and silently ignored.
    pub fn handle(&self, command: BatteryCommand) -> Result<(), ValidationError> {
        command.validate()?;

        let Some(engine) = self.registry.find(command.entity_id()) else {
            log::warn!(
                "Ignoring command for unknown entity {}",
                command.entity_id()
            );
            return Ok(());
        };

        let now = self.clock.now();
        let mut engine = engine.lock().unwrap();

        match command {
            BatteryCommand::ResetBatteryLevel { .. } => {
                engine.reset(now);
            }
            BatteryCommand::SetBatteryLevel { battery_level, .. } => {
                engine.set_level(battery_level as f64, now);
            }
            BatteryCommand::SetDischargeDays { discharge_days, .. } => {
                engine.set_discharge_days(discharge_days as u32, now);
            }
        }

        Ok(())
    }
}
