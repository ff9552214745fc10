//! Bounded diagnostic log of client events.

use std::collections::VecDeque;

use chrono::Local;
use serde::Serialize;

/// Kind of a diagnostic log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Transport connected.
    Connect,
    /// Transport closed.
    Disconnect,
    /// Transport or protocol error.
    Error,
    /// Message handed to the transport.
    Send,
    /// Frame received from the relay.
    Receive,
    /// Pending entry replaced by its confirmation.
    Update,
    /// New entry appended from the relay.
    Message,
}

impl LogKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Connect => "connect",
            LogKind::Disconnect => "disconnect",
            LogKind::Error => "error",
            LogKind::Send => "send",
            LogKind::Receive => "receive",
            LogKind::Update => "update",
            LogKind::Message => "message",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A diagnostic log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Local time the entry was recorded.
    pub timestamp: String,
    /// Entry kind.
    pub kind: LogKind,
    /// Human-readable description.
    pub message: String,
    /// Pretty-printed JSON of the related payload.
    pub data: Option<String>,
}

impl LogEntry {
    /// Format the entry for a single terminal line (data omitted).
    pub fn format(&self) -> String {
        format!("{} [{}] {}", self.timestamp, self.kind, self.message)
    }
}

/// Ring buffer keeping the most recent entries.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    /// Create a log holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Record an entry without payload.
    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) -> LogEntry {
        self.record(kind, message.into(), None)
    }

    /// Record an entry with a JSON payload.
    pub fn push_with_data<T: Serialize>(
        &mut self,
        kind: LogKind,
        message: impl Into<String>,
        data: &T,
    ) -> LogEntry {
        let data = serde_json::to_string_pretty(data).ok();
        self.record(kind, message.into(), data)
    }

    fn record(&mut self, kind: LogKind, message: String, data: Option<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            kind,
            message,
            data,
        };
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_kind_as_str() {
        assert_eq!(LogKind::Connect.as_str(), "connect");
        assert_eq!(LogKind::Update.as_str(), "update");
        assert_eq!(LogKind::Message.to_string(), "message");
    }

    #[test]
    fn test_push_and_clear() {
        let mut log = EventLog::new(10);
        let entry = log.push(LogKind::Connect, "Connected");
        assert_eq!(entry.kind, LogKind::Connect);
        assert!(entry.data.is_none());
        assert_eq!(log.len(), 1);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.push(LogKind::Receive, format!("frame {i}"));
        }
        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["frame 2", "frame 3", "frame 4"]);
    }

    #[test]
    fn test_push_with_data_pretty_prints() {
        let mut log = EventLog::new(5);
        let entry = log.push_with_data(
            LogKind::Send,
            "Sending message",
            &serde_json::json!({"sender": "Ann"}),
        );
        let data = entry.data.unwrap();
        assert!(data.contains("\"sender\": \"Ann\""));
        assert!(data.contains('\n'));
    }

    #[test]
    fn test_format() {
        let mut log = EventLog::new(1);
        let entry = log.push(LogKind::Error, "Connection error");
        assert!(entry.format().ends_with("[error] Connection error"));
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut log = EventLog::new(0);
        log.push(LogKind::Send, "a");
        log.push(LogKind::Send, "b");
        assert_eq!(log.len(), 1);
    }
}
