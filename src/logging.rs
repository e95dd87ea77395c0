#![cfg(feature = "std")]

use std::env;
use log::{self, LevelFilter, Metadata, Record};

struct ServerLogger;

impl log::Log for ServerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!(
                "{} [{}] {}",
                record.level(),
                record.module_path().unwrap_or(record.target()),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: ServerLogger = ServerLogger;

/// Install the server logger with the level from `BATTLESHIP_LOG`
/// (`error`, `warn`, `info`, `debug`, `trace` or `off`). Defaults to `info`.
/// Calling it again is a no-op.
pub fn init_logging() {
    let level = env::var("BATTLESHIP_LOG")
        .ok()
        .and_then(|lvl| lvl.parse().ok())
        .unwrap_or(LevelFilter::Info);
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(level));
}
