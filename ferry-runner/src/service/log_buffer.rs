//! Log buffer service
//!
//! Collects the run log in memory. Tool output and stage transitions are
//! appended while the run progresses; the whole buffer is drained into the run
//! report when the run finishes.

use ferry_core::domain::log::{LogEntry, LogLevel};
use std::sync::{Arc, Mutex};

/// Service for managing the run log
pub trait LogBufferService: Send + Sync {
    /// Adds a log entry to the buffer
    fn add_entry(&self, entry: LogEntry);

    /// Drains all log entries from the buffer
    fn drain(&self) -> Vec<LogEntry>;

    fn log(&self, level: LogLevel, message: String) {
        self.add_entry(LogEntry::now(level, message));
    }

    fn log_info(&self, message: String) {
        self.log(LogLevel::Info, message);
    }

    fn log_warning(&self, message: String) {
        self.log(LogLevel::Warning, message);
    }

    fn log_error(&self, message: String) {
        self.log(LogLevel::Error, message);
    }
}

/// In-memory implementation of LogBufferService
#[derive(Clone, Default)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl InMemoryLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogBufferService for InMemoryLogBuffer {
    fn add_entry(&self, entry: LogEntry) {
        // A poisoned lock only means another writer panicked mid-push
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.push(entry);
    }

    fn drain(&self) -> Vec<LogEntry> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.drain(..).collect()
    }
}
