//! Logger initialization for the virtual battery service

use std::io::Write;
use std::sync::Once;

use crate::config::LogLevel;

/// Timestamp format for log entries
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Global initialization guard
static INIT_LOGGER: Once = Once::new();

/// Initialize the logger once, honoring `RUST_LOG` over the configured level
pub fn init_logger(level: LogLevel) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(level.to_filter())
            .parse_default_env()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] {} [{}] {}",
                    chrono::Local::now().format(TIMESTAMP_FORMAT),
                    record.level(),
                    record.module_path().unwrap_or("<unknown>"),
                    record.args()
                )
            });

        if builder.try_init().is_err() {
            // A logger was already installed (e.g. by a test harness)
            log::debug!("Logger already initialized");
        }
    });
}
