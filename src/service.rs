//! Service wiring: entry lifecycle, event distribution and persistence
//!
//! A [`BatteryService`] owns the broker, the store, the registry and one tick
//! loop per configured entry. Setting up an entry creates the engine, restores
//! it from the store and starts its tick loop; unloading aborts the loop and
//! drops the engine from the registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

use crate::battery::{BatteryEngine, BatteryEvent, EventBroker, EventFilter, SubscriberId};
use crate::clock::Clock;
use crate::commands::{BatteryCommand, CommandHandler};
use crate::config::{AppConfig, BatteryConfig};
use crate::errors::ValidationError;
use crate::persistence::{SnapshotWriter, StateStore};
use crate::registry::EngineRegistry;
use crate::scheduler::TickScheduler;

/// Owns all running pieces of the virtual battery integration
pub struct BatteryService {
    registry: EngineRegistry,
    broker: EventBroker,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    scheduler: TickScheduler,
    /// Tick loop cancellation handles, per entry id
    tick_tasks: HashMap<String, JoinHandle<()>>,
    /// Persistence adapter task
    writer_task: Option<JoinHandle<()>>,
}

impl BatteryService {
    /// Create a stopped service from configuration and injected capabilities
    pub fn new(config: &AppConfig, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let scheduler = TickScheduler::new(config.tick_interval, Arc::clone(&clock));

        Self {
            registry: EngineRegistry::new(),
            broker: EventBroker::new(),
            store,
            clock,
            scheduler,
            tick_tasks: HashMap::new(),
            writer_task: None,
        }
    }

    /// Start event distribution and the persistence adapter
    pub fn start(&mut self) {
        let (_, rx) = self.broker.subscribe(EventFilter::state_changes_only());
        self.broker.start();

        self.writer_task = Some(SnapshotWriter::spawn(
            rx,
            self.registry.clone(),
            Arc::clone(&self.store),
        ));
    }

    /// Set up one configured entry: create, restore, register, start ticking
    pub fn setup_entry(&mut self, config: &BatteryConfig) {
        let now = self.clock.now();
        let mut engine = BatteryEngine::new(
            config.name.clone(),
            config.discharge_days,
            self.scheduler.tick_interval(),
            now,
        );

        let snapshot = self.store.restore(&config.name);
        engine.restore(snapshot.as_ref(), now);
        engine.set_event_sender(self.broker.get_sender());

        log::info!(
            "Battery {} attached at {:.2}% ({} day window)",
            config.name,
            engine.level(),
            engine.discharge_days()
        );

        let handle = engine.into_handle();
        self.registry.register(config.name.clone(), Arc::clone(&handle));
        self.tick_tasks
            .insert(config.name.clone(), self.scheduler.start(handle));
    }

    /// Tear down one entry: stop its tick loop and drop it from the registry
    pub fn unload_entry(&mut self, entry_id: &str) {
        if let Some(task) = self.tick_tasks.remove(entry_id) {
            task.abort();
        }
        self.registry.unregister(entry_id);
    }

    /// Apply an options update by routing through the normal command path
    pub fn update_options(
        &self,
        entry_id: &str,
        discharge_days: u32,
    ) -> Result<(), ValidationError> {
        self.command_handler().handle(BatteryCommand::SetDischargeDays {
            entity_id: entry_id.to_string(),
            discharge_days: i64::from(discharge_days),
        })
    }

    /// Command handler bound to this service's registry and clock
    pub fn command_handler(&self) -> CommandHandler {
        CommandHandler::new(self.registry.clone(), Arc::clone(&self.clock))
    }

    /// Subscribe to engine events
    pub fn subscribe(&mut self, filter: EventFilter) -> (SubscriberId, Receiver<BatteryEvent>) {
        self.broker.subscribe(filter)
    }

    /// Engine registry handle
    pub fn registry(&self) -> EngineRegistry {
        self.registry.clone()
    }

    /// Stop all tick loops, the persistence adapter and the broker
    pub fn shutdown(&mut self) {
        for (_, task) in self.tick_tasks.drain() {
            task.abort();
        }
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
        self.broker.shutdown();
        log::info!("Battery service stopped");
    }
}

impl Drop for BatteryService {
    fn drop(&mut self) {
        for (_, task) in self.tick_tasks.drain() {
            task.abort();
        }
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}
