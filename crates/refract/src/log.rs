//! Logging sink used by the walker, classifier and facade
//!
//! The facility never depends on log output for correctness; diagnostics go
//! through a [`LogSink`] so hosts can route them anywhere. [`TracingSink`] is
//! the default and forwards to `tracing` under the `refract` target.

use std::error::Error;
use std::fmt;

use parking_lot::Mutex;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Per-step probe information
    Debug,
    /// Structural problems callers may care about
    Warn,
    /// Swallowed failures
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => f.write_str("debug"),
            LogLevel::Warn => f.write_str("warn"),
            LogLevel::Error => f.write_str("error"),
        }
    }
}

/// Abstract destination for leveled diagnostics
pub trait LogSink: Send + Sync {
    /// Record a message with an optional cause
    fn log(&self, level: LogLevel, message: &str, cause: Option<&(dyn Error + 'static)>);

    /// Record a debug message
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    /// Record a warning
    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    /// Record an error with its cause
    fn error(&self, message: &str, cause: Option<&(dyn Error + 'static)>) {
        self.log(LogLevel::Error, message, cause);
    }
}

/// Forwards diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, cause: Option<&(dyn Error + 'static)>) {
        match (level, cause) {
            (LogLevel::Debug, None) => tracing::debug!(target: "refract", "{message}"),
            (LogLevel::Debug, Some(err)) => {
                tracing::debug!(target: "refract", error = %err, "{message}")
            }
            (LogLevel::Warn, None) => tracing::warn!(target: "refract", "{message}"),
            (LogLevel::Warn, Some(err)) => {
                tracing::warn!(target: "refract", error = %err, "{message}")
            }
            (LogLevel::Error, None) => tracing::error!(target: "refract", "{message}"),
            (LogLevel::Error, Some(err)) => {
                tracing::error!(target: "refract", error = %err, "{message}")
            }
        }
    }
}

/// A single captured diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Rendered cause, if any
    pub cause: Option<String>,
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at exactly `level`
    pub fn at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Drop all records
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: LogLevel, message: &str, cause: Option<&(dyn Error + 'static)>) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
            cause: cause.map(|c| c.to_string()),
        });
    }
}
