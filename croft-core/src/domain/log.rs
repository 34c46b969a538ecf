//! Job log domain types

use serde::{Deserialize, Serialize};

/// A log entry recorded while a job was processed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
        }
    }

    /// Unknown column values read back as `Info`
    pub fn parse(s: &str) -> Self {
        match s {
            "Debug" => LogLevel::Debug,
            "Warning" => LogLevel::Warning,
            "Error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}
