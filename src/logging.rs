//! Ambient operational tracing, distinct from `audit`'s protocol-fixed log
//! lines. A small hand-rolled `log::Log` sink, in the spirit of the
//! pack's `runtime` crate rolling its own logger rather than depending on
//! a heavier logging backend (see DESIGN.md).

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Installs the stderr sink at `level`. Safe to call more than once; later
/// calls are no-ops (mirrors `log::set_logger`'s own idempotence).
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
