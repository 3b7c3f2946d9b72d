//! Real-time log streaming via Server-Sent Events (SSE).
//!
//! A global broadcast channel carries run progress to connected clients
//! while mirroring every entry to stdout.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Log level for client display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Global log broadcaster.
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients.
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Send a log entry to all subscribers, mirroring it to stdout.
    pub fn log(&self, entry: LogEntry) {
        let tag = match entry.level {
            LogLevel::Info => "INFO ",
            LogLevel::Success => "OK   ",
            LogLevel::Warning => "WARN ",
            LogLevel::Error => "ERROR",
        };
        println!("[{}] {}", tag, entry.message);

        // no receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, msg));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::new(LogLevel::Info, "hello"));
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.message, "hello");
    }

    #[test]
    fn test_log_without_subscribers_is_fine() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.log(LogEntry::new(LogLevel::Warning, "nobody listening"));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = LogEntry::new(LogLevel::Success, "done");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"level\":\"success\""));
        assert!(json.contains("\"timestamp\""));
    }
}
