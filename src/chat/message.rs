//! Chat message shared by the relay and the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::token::CorrelationToken;
use crate::datetime::{to_iso8601, ServerClock};

/// Provenance value written by the relay.
pub const PROCESSED_BY_SERVER: &str = "server";

/// Where a message came from, as seen by its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Created locally, not yet stamped by the relay.
    LocalPending,
    /// Stamped by the relay on behalf of a human sender.
    ServerConfirmed,
    /// Generated by the relay's responder.
    Synthetic,
}

impl Origin {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::LocalPending => "local-pending",
            Origin::ServerConfirmed => "server-confirmed",
            Origin::Synthetic => "synthetic",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat message.
///
/// The relay forwards whatever it receives, so every known field is optional.
/// Unknown fields, and known fields carrying a value of the wrong JSON type,
/// survive the round trip through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Sender's display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Message body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Token set by the originating client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<CorrelationToken>,
    /// Human-readable server time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<String>,
    /// ISO 8601 processing timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_processed_at: Option<String>,
    /// Provenance flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    /// Synthetic-sender marker.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_synthetic: bool,
    /// Fields this crate doesn't know about, forwarded verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for ChatMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::<String, Value>::deserialize(deserializer).map(Into::into)
    }
}

impl From<Map<String, Value>> for ChatMessage {
    fn from(mut fields: Map<String, Value>) -> Self {
        let sender = take_string(&mut fields, "sender");
        let text = take_string(&mut fields, "text");
        let correlation_token = take_string(&mut fields, "correlation_token").map(CorrelationToken::new);
        let server_time = take_string(&mut fields, "server_time");
        let server_processed_at = take_string(&mut fields, "server_processed_at");
        let processed_by = take_string(&mut fields, "processed_by");
        let is_synthetic = match fields.remove("is_synthetic") {
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                fields.insert("is_synthetic".to_string(), other);
                false
            }
            None => false,
        };

        Self {
            sender,
            text,
            correlation_token,
            server_time,
            server_processed_at,
            processed_by,
            is_synthetic,
            extra: fields,
        }
    }
}

/// Remove `key` if it holds a string. Any other value stays in `fields`.
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => Some(s),
        other => {
            fields.insert(key.to_string(), other);
            None
        }
    }
}

impl ChatMessage {
    /// Create a client-originated message carrying a correlation token.
    pub fn outgoing(
        sender: impl Into<String>,
        text: impl Into<String>,
        token: CorrelationToken,
    ) -> Self {
        Self {
            sender: Some(sender.into()),
            text: Some(text.into()),
            correlation_token: Some(token),
            ..Self::default()
        }
    }

    /// Create a responder message. It carries no token.
    pub fn synthetic(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            text: Some(text.into()),
            is_synthetic: true,
            ..Self::default()
        }
    }

    /// Stamp the message with server time and provenance.
    ///
    /// Everything else, the correlation token included, is left untouched.
    pub fn stamp(&mut self, clock: &ServerClock, now: DateTime<Utc>) {
        for key in ["server_time", "server_processed_at", "processed_by"] {
            self.extra.remove(key);
        }
        self.server_time = Some(clock.display(&now));
        self.server_processed_at = Some(to_iso8601(&now));
        self.processed_by = Some(PROCESSED_BY_SERVER.to_string());
    }

    /// Return a stamped copy of the message.
    pub fn stamped(mut self, clock: &ServerClock) -> Self {
        self.stamp(clock, Utc::now());
        self
    }

    /// Whether the relay has stamped this message.
    pub fn is_stamped(&self) -> bool {
        self.server_processed_at.is_some()
    }

    /// Classify the message.
    pub fn origin(&self) -> Origin {
        if self.is_synthetic {
            Origin::Synthetic
        } else if self.is_stamped() {
            Origin::ServerConfirmed
        } else {
            Origin::LocalPending
        }
    }

    /// Sender name, empty if missing or not a string.
    pub fn sender_name(&self) -> &str {
        self.sender.as_deref().unwrap_or_default()
    }

    /// Message body, empty if missing or not a string.
    pub fn body(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Format the message for a single terminal line.
    pub fn format(&self) -> String {
        match &self.server_time {
            Some(time) => format!("[{}] <{}> {}", time, self.sender_name(), self.body()),
            None => format!("<{}> {}", self.sender_name(), self.body()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_outgoing_is_local_pending() {
        let msg = ChatMessage::outgoing("Ann", "hi", CorrelationToken::new("t-1"));
        assert_eq!(msg.sender.as_deref(), Some("Ann"));
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(msg.correlation_token, Some(CorrelationToken::new("t-1")));
        assert_eq!(msg.origin(), Origin::LocalPending);
    }

    #[test]
    fn test_synthetic_has_no_token() {
        let msg = ChatMessage::synthetic("Bot", "hello");
        assert!(msg.correlation_token.is_none());
        assert_eq!(msg.origin(), Origin::Synthetic);
    }

    #[test]
    fn test_stamp_keeps_token() {
        let clock = ServerClock::new("UTC", "%H:%M:%S");
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let mut msg = ChatMessage::outgoing("Ann", "hi", CorrelationToken::new("t-1"));
        msg.stamp(&clock, now);

        assert_eq!(msg.server_time.as_deref(), Some("10:30:00"));
        assert_eq!(
            msg.server_processed_at.as_deref(),
            Some("2024-01-15T10:30:00.000Z")
        );
        assert_eq!(msg.processed_by.as_deref(), Some("server"));
        assert_eq!(msg.correlation_token, Some(CorrelationToken::new("t-1")));
        assert_eq!(msg.origin(), Origin::ServerConfirmed);
    }

    #[test]
    fn test_serialize_omits_empty_fields() {
        let msg = ChatMessage::outgoing("Ann", "hi", CorrelationToken::new("t-1"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sender": "Ann", "text": "hi", "correlation_token": "t-1"})
        );
    }

    #[test]
    fn test_unknown_fields_survive() {
        let json = r#"{"sender":"Ann","text":"hi","mood":"happy"}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.extra.get("mood"), Some(&Value::from("happy")));

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["mood"], "happy");
    }

    #[test]
    fn test_missing_sender_and_text_parse() {
        let msg: ChatMessage = serde_json::from_str("{}").unwrap();
        assert!(msg.sender.is_none());
        assert!(msg.text.is_none());
        assert_eq!(msg.sender_name(), "");
        assert_eq!(msg.body(), "");
    }

    #[test]
    fn test_wrong_typed_fields_kept_in_extra() {
        let json = r#"{"sender":"Ann","text":42,"correlation_token":7,"is_synthetic":"no"}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.sender.as_deref(), Some("Ann"));
        assert!(msg.text.is_none());
        assert_eq!(msg.body(), "");
        assert!(msg.correlation_token.is_none());
        assert!(!msg.is_synthetic);

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["text"], 42);
        assert_eq!(back["correlation_token"], 7);
        assert_eq!(back["is_synthetic"], "no");
    }

    #[test]
    fn test_stamp_replaces_wrong_typed_stamps() {
        let json = r#"{"sender":"Ann","text":"hi","server_time":5,"processed_by":false}"#;
        let mut msg: ChatMessage = serde_json::from_str(json).unwrap();
        msg.stamp(&ServerClock::default(), Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());

        assert!(msg.extra.is_empty());
        let out = serde_json::to_string(&msg).unwrap();
        assert_eq!(out.matches("\"server_time\"").count(), 1);
        assert_eq!(out.matches("\"processed_by\"").count(), 1);
    }

    #[test]
    fn test_format() {
        let mut msg = ChatMessage::outgoing("Ann", "hi", CorrelationToken::new("t"));
        assert_eq!(msg.format(), "<Ann> hi");
        msg.server_time = Some("10:30:00".to_string());
        assert_eq!(msg.format(), "[10:30:00] <Ann> hi");
    }

    #[test]
    fn test_origin_as_str() {
        assert_eq!(Origin::LocalPending.as_str(), "local-pending");
        assert_eq!(Origin::ServerConfirmed.as_str(), "server-confirmed");
        assert_eq!(Origin::Synthetic.to_string(), "synthetic");
    }
}
