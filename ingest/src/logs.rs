//! Run log with fan-out to subscribers.
//!
//! Every entry is echoed to stderr and broadcast to any subscriber, so a
//! caller (or a test) can observe warnings such as the alias fallback or
//! unresolved fields without scraping terminal output.

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all subscribers
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
    quiet: AtomicBool,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            sender,
            quiet: AtomicBool::new(false),
        }
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        if !self.quiet.load(Ordering::Relaxed) {
            let prefix = match entry.level {
                LogLevel::Info => "   ",
                LogLevel::Success => "   ✓",
                LogLevel::Warning => "   ⚠️",
                LogLevel::Error => "   ❌",
            };
            let indent = "   ".repeat(entry.indent as usize);
            eprintln!("{}{} {}", indent, prefix, entry.message);
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver of subsequent entries
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Stop echoing to stderr; subscribers still receive entries.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::warning(msg).with_indent(indent));
}

/// Drain every entry currently buffered for `rx`.
pub fn drain(rx: &mut broadcast::Receiver<LogEntry>) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(entry) => entries.push(entry),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    entries
}
