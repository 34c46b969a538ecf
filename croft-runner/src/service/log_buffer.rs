//! Log buffer service
//!
//! Collects log entries while a job is dispatched. The buffer is drained and
//! written to the job log store once the job has been finalized.

use croft_core::domain::log::{LogEntry, LogLevel};
use std::sync::{Arc, Mutex};

/// Service for managing log buffers
///
/// Handlers write through this trait; the poller drains it after
/// finalization.
pub trait LogBufferService: Send + Sync {
    /// Adds a log entry to the buffer
    fn add_entry(&self, entry: LogEntry);

    /// Returns all buffered entries and clears the buffer
    fn drain(&self) -> Vec<LogEntry>;

    fn info(&self, message: String) {
        self.add_entry(LogEntry::now(LogLevel::Info, message));
    }

    fn warning(&self, message: String) {
        self.add_entry(LogEntry::now(LogLevel::Warning, message));
    }

    fn error(&self, message: String) {
        self.add_entry(LogEntry::now(LogLevel::Error, message));
    }
}

/// In-memory implementation of LogBufferService
///
/// Clones share the same buffer, so a spawned handler and the poller see the
/// same entries.
#[derive(Clone, Default)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl InMemoryLogBuffer {
    /// Creates a new in-memory log buffer
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogBufferService for InMemoryLogBuffer {
    fn add_entry(&self, entry: LogEntry) {
        // A panicking handler may poison the lock; its entries are still wanted
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.push(entry);
    }

    fn drain(&self) -> Vec<LogEntry> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.drain(..).collect()
    }
}
