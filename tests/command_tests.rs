//! Integration tests for command validation and routing

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use virtual_battery::clock::{Clock, ManualClock};
use virtual_battery::{
    BatteryCommand, BatteryEngine, CommandHandler, EngineRegistry, ValidationError,
};

const TICK: Duration = Duration::from_secs(60);

struct Fixture {
    handler: CommandHandler,
    registry: EngineRegistry,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let registry = EngineRegistry::new();

    for id in ["kitchen_sensor", "door_sensor"] {
        let engine = BatteryEngine::new(id, 30, TICK, start);
        registry.register(id, engine.into_handle());
    }

    Fixture {
        handler: CommandHandler::new(registry.clone(), clock.clone()),
        registry,
        clock,
    }
}

fn level_of(registry: &EngineRegistry, id: &str) -> f64 {
    registry.find(id).unwrap().lock().unwrap().level()
}

/// Commands route to the targeted engine only
#[test]
fn test_command_routing() {
    let fx = fixture();
    fx.clock.advance(chrono::Duration::hours(1));

    fx.handler
        .handle(BatteryCommand::SetBatteryLevel {
            entity_id: "kitchen_sensor".to_string(),
            battery_level: 55,
        })
        .unwrap();

    assert_eq!(level_of(&fx.registry, "kitchen_sensor"), 55.0);
    assert_eq!(level_of(&fx.registry, "door_sensor"), 100.0);
}

/// Boundary validation rejects bad input before any engine is touched
#[test]
fn test_boundary_validation() {
    let fx = fixture();

    let err = fx
        .handler
        .handle(BatteryCommand::SetBatteryLevel {
            entity_id: "kitchen_sensor".to_string(),
            battery_level: 150,
        })
        .unwrap_err();
    assert_eq!(err, ValidationError::LevelOutOfRange(150));

    let err = fx
        .handler
        .handle(BatteryCommand::SetDischargeDays {
            entity_id: "kitchen_sensor".to_string(),
            discharge_days: -5,
        })
        .unwrap_err();
    assert_eq!(err, ValidationError::DischargeDaysOutOfRange(-5));

    // State untouched after both rejections
    assert_eq!(level_of(&fx.registry, "kitchen_sensor"), 100.0);
    let engine = fx.registry.find("kitchen_sensor").unwrap();
    assert_eq!(engine.lock().unwrap().discharge_days(), 30);
}

/// An unknown entity id is accepted and ignored
#[test]
fn test_routing_miss_is_silent() {
    let fx = fixture();

    let result = fx.handler.handle(BatteryCommand::SetBatteryLevel {
        entity_id: "garage_sensor".to_string(),
        battery_level: 10,
    });

    assert!(result.is_ok());
    assert_eq!(level_of(&fx.registry, "kitchen_sensor"), 100.0);
    assert_eq!(level_of(&fx.registry, "door_sensor"), 100.0);
}

/// Reset re-bases the decay origin to the command instant
#[test]
fn test_reset_rebases_to_command_instant() {
    let fx = fixture();
    fx.clock.advance(chrono::Duration::days(12));

    fx.handler
        .handle(BatteryCommand::ResetBatteryLevel {
            entity_id: "door_sensor".to_string(),
        })
        .unwrap();

    let engine = fx.registry.find("door_sensor").unwrap();
    let engine = engine.lock().unwrap();
    assert_eq!(engine.level(), 100.0);
    assert_eq!(engine.last_reset(), fx.clock.now());
    assert_eq!(engine.last_update(), fx.clock.now());
}

/// An override decays correctly afterwards: set to 50 on a 30 day window,
/// then 3 more days cost 10 more percent
#[test]
fn test_override_then_continued_decay() {
    let fx = fixture();
    fx.clock.advance(chrono::Duration::days(1));

    fx.handler
        .handle(BatteryCommand::SetBatteryLevel {
            entity_id: "kitchen_sensor".to_string(),
            battery_level: 50,
        })
        .unwrap();

    let engine = fx.registry.find("kitchen_sensor").unwrap();
    let later = fx.clock.now() + chrono::Duration::days(3);
    engine.lock().unwrap().advance(later);

    let level = engine.lock().unwrap().level();
    assert!((level - 40.0).abs() < 0.01, "got {}", level);
}

/// Unregistered entries stop receiving commands
#[test]
fn test_commands_after_unload() {
    let fx = fixture();
    fx.registry.unregister("door_sensor");

    let result = fx.handler.handle(BatteryCommand::ResetBatteryLevel {
        entity_id: "door_sensor".to_string(),
    });

    // Silent no-op, same as any unknown id
    assert!(result.is_ok());
    assert_eq!(fx.registry.len(), 1);
}
