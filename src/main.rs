use std::sync::Arc;

use futures::StreamExt;

use virtual_battery::battery::{receiver_to_stream, EventFilter};
use virtual_battery::clock::SystemClock;
use virtual_battery::config::AppConfig;
use virtual_battery::persistence::JsonFileStore;
use virtual_battery::service::BatteryService;
use virtual_battery::{logging, Clock, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("vbattery - Virtual Battery Service");

    // Get command line args to determine what to run
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("run") => run().await,
        Some("status") => status(),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

/// Run the tick loops until interrupted
async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    logging::init_logger(config.log_level);

    if config.batteries.is_empty() {
        log::warn!("No batteries configured; nothing to do");
        print_usage();
        return Ok(());
    }

    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new());
    let clock = Arc::new(SystemClock);

    let mut service = BatteryService::new(&config, store, clock);
    service.start();
    for battery in &config.batteries {
        service.setup_entry(battery);
    }

    // Log threshold crossings as they fire
    let (_, rx) = service.subscribe(EventFilter::thresholds_only());
    tokio::spawn(async move {
        let mut events = Box::pin(receiver_to_stream(rx));
        while let Some(event) = events.next().await {
            log::info!(
                "{}: {} at {:.2}%",
                event.entity_id(),
                event.event_name(),
                event.battery_level()
            );
        }
    });

    wait_for_interrupt().await?;
    service.shutdown();
    Ok(())
}

/// Print the current level of every configured battery and exit
fn status() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    logging::init_logger(config.log_level);

    let store = JsonFileStore::new();
    let clock = SystemClock;
    let now = clock.now();

    for battery in &config.batteries {
        let mut engine = virtual_battery::BatteryEngine::new(
            battery.name.clone(),
            battery.discharge_days,
            config.tick_interval,
            now,
        );
        let snapshot = store.restore(&battery.name);
        engine.restore(snapshot.as_ref(), now);
        engine.advance(now);

        println!(
            "{}: {:.2}% (reset {:.2} days ago, empty in {:.2} days)",
            battery.name,
            engine.level(),
            engine.time_since_reset(now),
            engine.time_until_empty()
        );
    }

    Ok(())
}

/// Block until Ctrl-C
async fn wait_for_interrupt() -> anyhow::Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    tokio::task::spawn_blocking(move || rx.recv()).await??;
    log::info!("Interrupt received, shutting down");
    Ok(())
}

fn print_usage() {
    println!("\nUsage:");
    println!("  vbattery run      - Run the battery tick loops (default)");
    println!("  vbattery status   - Print current battery levels and exit");
}
