//! A `log` sink that emits one Cloud Logging structured entry per record.
//!
//! The bootstrap's stdout is collected by the host's logging agent, so every
//! line must be a single JSON object carrying severity, message, timestamp,
//! source location, and component labels rather than terminal-friendly text.

use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

const COMPONENT: &str = "github-actions-runner";

pub(crate) struct CloudLogger {
    level: LevelFilter,
}

impl CloudLogger {
    /// Installs a logger constructed once here as the sink for the `log`
    /// macros used across the crates.
    pub(crate) fn init(level: LevelFilter) -> std::result::Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(Self { level }))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for CloudLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            println!("{}", format_entry(record, SystemTime::now()));
        }
    }

    fn flush(&self) {}
}

/// Renders one record as a single-line JSON entry.
fn format_entry(record: &Record<'_>, now: SystemTime) -> String {
    let elapsed = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let severity = match record.level() {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug | Level::Trace => "DEBUG",
    };

    json!({
        "severity": severity,
        "message": record.args().to_string(),
        "timestamp": {
            "seconds": elapsed.as_secs(),
            "nanos": elapsed.subsec_nanos(),
        },
        "sourceLocation": {
            "file": record.file().unwrap_or("<unknown>"),
            "line": record.line().unwrap_or(0).to_string(),
            "function": record.target(),
        },
        "labels": {
            "component": COMPONENT,
            "module": record.module_path().unwrap_or("<unknown>"),
        },
    })
    .to_string()
}
