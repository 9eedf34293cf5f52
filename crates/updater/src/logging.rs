//! Injected logging capability.
//!
//! Every component receives an `Arc<dyn EventLog>` instead of reaching for a
//! global logger, so tests can capture exactly what was emitted.

use std::sync::{Arc, Mutex};

/// Severity of a recorded log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

/// Sink for diagnostic messages emitted by the updater components.
pub trait EventLog: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards every entry to `tracing` under the `splash_updater` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl TracingLog {
    pub fn shared() -> Arc<dyn EventLog> {
        Arc::new(TracingLog)
    }
}

impl EventLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "splash_updater", "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "splash_updater", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "splash_updater", "{message}");
    }
}

/// A single captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// In-memory sink that keeps every entry, also forwarding to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: LogLevel, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                level,
                message: message.to_string(),
            });
        }
    }

    /// Snapshot of all entries recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Number of entries whose message contains `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.message.contains(needle))
            .count()
    }
}

impl EventLog for MemoryLog {
    fn info(&self, message: &str) {
        TracingLog.info(message);
        self.push(LogLevel::Info, message);
    }

    fn debug(&self, message: &str) {
        TracingLog.debug(message);
        self.push(LogLevel::Debug, message);
    }

    fn error(&self, message: &str) {
        TracingLog.error(message);
        self.push(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_records_levels_in_order() {
        let log = MemoryLog::new();
        log.info("first");
        log.debug("second");
        log.error("third first");

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].level, LogLevel::Debug);
        assert_eq!(entries[2].level, LogLevel::Error);
        assert_eq!(log.count_containing("first"), 2);
    }

    #[test]
    fn clones_share_the_same_buffer() {
        let log = MemoryLog::new();
        let shared: Arc<dyn EventLog> = Arc::new(log.clone());
        shared.info("via trait object");
        assert_eq!(log.count_containing("via trait object"), 1);
    }
}
