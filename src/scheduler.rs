//! Fixed-interval tick scheduling for battery engines

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::battery::EngineHandle;
use crate::clock::Clock;
use crate::registry::EngineRegistry;

/// Default tick cadence: one recompute per minute
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Drives engine recomputes at a fixed cadence
///
/// Each started loop owns a tokio interval; the returned `JoinHandle` is the
/// cancellation handle and is aborted on teardown. The level computation
/// re-derives from elapsed time, so a missed or delayed tick cannot skew it.
pub struct TickScheduler {
    tick_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl TickScheduler {
    pub fn new(tick_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tick_interval,
            clock,
        }
    }

    /// Tick cadence this scheduler was built with
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Start the tick loop for a single engine
    pub fn start(&self, engine: EngineHandle) -> JoinHandle<()> {
        let clock = Arc::clone(&self.clock);
        let tick_interval = self.tick_interval;

        tokio::spawn(async move {
            let mut timer = interval(tick_interval);
            // The first tick fires immediately; skip it so the engine is not
            // recomputed at the same instant it was attached
            timer.tick().await;

            loop {
                timer.tick().await;
                let now = clock.now();
                engine.lock().unwrap().advance(now);
            }
        })
    }

    /// Start one tick loop advancing every engine in the registry
    pub fn start_all(&self, registry: EngineRegistry) -> JoinHandle<()> {
        let clock = Arc::clone(&self.clock);
        let tick_interval = self.tick_interval;

        tokio::spawn(async move {
            let mut timer = interval(tick_interval);
            timer.tick().await;

            loop {
                timer.tick().await;
                let now = clock.now();

                for entry_id in registry.entry_ids() {
                    if let Some(engine) = registry.find(&entry_id) {
                        engine.lock().unwrap().advance(now);
                    }
                }
            }
        })
    }
}
