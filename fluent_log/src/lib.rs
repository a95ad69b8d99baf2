/*!
 * Fluent Log — forwards `log` records to fluentd.
 *
 * This crate provides `FluentLogger`, a `log::Log` implementation that turns
 * each enabled record into a `LogEntry` and posts it fire-and-forget through
 * a `fluent::Client`, tagged `<tag>.<level>`.
 *
 * # Usage
 *
 * ```ignore
 * let client = Arc::new(fluent::Client::new(&[fluent::with_tag_prefix("myapp")])?);
 * fluent_log::install(Arc::clone(&client), "log", log::LevelFilter::Info)?;
 *
 * log::info!("service started");   // -> tag "myapp.log.info"
 * ```
 *
 * # Recursion safety
 *
 * The client's own worker logs through the `log` facade too. Records from
 * the `fluent` crate are never forwarded, and a `thread_local` flag stops
 * re-entry if posting itself ends up logging on the same thread.
 */

use std::cell::Cell;
use std::sync::Arc;

use fluent::Client;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::Serialize;

thread_local! {
    static IN_LOG: Cell<bool> = const { Cell::new(false) };
}

// ---------------------------------------------------------------------------
// LogEntry — the record posted for each log line
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: &'static str,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl LogEntry {
    fn from_record(record: &Record<'_>) -> Self {
        Self {
            level: record.level().as_str(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            module_path: record.module_path().map(str::to_string),
            file: record.file().map(str::to_string),
            line: record.line(),
        }
    }
}

// ---------------------------------------------------------------------------
// FluentLogger
// ---------------------------------------------------------------------------

pub struct FluentLogger {
    client: Arc<Client<LogEntry>>,
    tag: String,
    level: LevelFilter,
}

impl FluentLogger {
    /**
     * Creates a logger posting through `client`.
     *
     * # Arguments
     * * `client` - Client the entries are posted to
     * * `tag` - Tag stem; each entry is tagged `<tag>.<level>`
     * * `level` - Most verbose level forwarded
     */
    pub fn new(client: Arc<Client<LogEntry>>, tag: impl Into<String>, level: LevelFilter) -> Self {
        Self {
            client,
            tag: tag.into(),
            level,
        }
    }
}

/// Targets belonging to the client itself.
fn is_internal(target: &str) -> bool {
    target == "fluent" || target.starts_with("fluent::")
}

impl Log for FluentLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level && !is_internal(metadata.target())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let reentered = IN_LOG.with(|flag| flag.replace(true));
        if reentered {
            return;
        }

        let tag = format!("{}.{}", self.tag, record.level().as_str().to_ascii_lowercase());
        /* Fire-and-forget: a closed client just stops forwarding. */
        let _ = self.client.post(&tag, LogEntry::from_record(record), &[]);

        IN_LOG.with(|flag| flag.set(false));
    }

    fn flush(&self) {}
}

/**
 * Registers a `FluentLogger` as the global `log` logger and sets the
 * maximum level.
 *
 * Fails if a global logger is already installed. The logger lives for the
 * rest of the process, like any global `log` logger.
 */
pub fn install(
    client: Arc<Client<LogEntry>>,
    tag: impl Into<String>,
    level: LevelFilter,
) -> Result<(), SetLoggerError> {
    let logger: &'static FluentLogger = Box::leak(Box::new(FluentLogger::new(client, tag, level)));
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}
