//! Client-side message reconciliation.
//!
//! Messages the user submits are shown immediately as `Sending` entries and
//! upgraded in place to `Delivered` when the relay echoes them back with the
//! same correlation token. Everything else is appended in arrival order.

use std::collections::HashMap;

use chrono::Local;

use super::message::ChatMessage;
use super::token::{CorrelationToken, TokenGenerator};

/// Delivery status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Submitted locally, no confirmation yet.
    Sending,
    /// Received from the relay.
    Delivered,
}

impl DeliveryStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Delivered => "delivered",
        }
    }
}

/// One entry of the displayed sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The message as last seen (local copy or server confirmation).
    pub message: ChatMessage,
    /// Delivery status.
    pub status: DeliveryStatus,
    /// Whether the local user sent it.
    pub is_mine: bool,
    /// Local wall-clock time of submission, for entries created by `submit`.
    pub submitted_at: Option<String>,
}

/// How the sequence changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceChange {
    /// A new entry was appended at `index`.
    Appended { index: usize },
    /// The entry at `index` was replaced by its confirmation.
    Replaced { index: usize },
}

impl SequenceChange {
    /// Index of the affected entry.
    pub fn index(&self) -> usize {
        match self {
            SequenceChange::Appended { index } | SequenceChange::Replaced { index } => *index,
        }
    }
}

/// Result of a successful submit.
#[derive(Debug, Clone)]
pub struct Submitted {
    /// Index of the new `Sending` entry.
    pub index: usize,
    /// Tokened message to hand to the transport.
    pub message: ChatMessage,
}

/// Ordered message sequence with optimistic local entries.
///
/// Append-only except for in-place upgrades. Not thread-safe by intent:
/// submits and incoming messages must be fed from one event loop.
#[derive(Debug)]
pub struct MessageReconciler {
    local_sender: String,
    tokens: TokenGenerator,
    entries: Vec<Entry>,
    by_token: HashMap<CorrelationToken, usize>,
}

impl MessageReconciler {
    /// Create an empty reconciler for the given local identity.
    pub fn new(local_sender: impl Into<String>) -> Self {
        Self::with_generator(local_sender, TokenGenerator::new())
    }

    /// Create a reconciler with an explicit token generator.
    pub fn with_generator(local_sender: impl Into<String>, tokens: TokenGenerator) -> Self {
        Self {
            local_sender: local_sender.into(),
            tokens,
            entries: Vec::new(),
            by_token: HashMap::new(),
        }
    }

    /// The local sender identity.
    pub fn local_sender(&self) -> &str {
        &self.local_sender
    }

    /// All entries in display order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Get an entry by index.
    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// Find the entry carrying the given token.
    pub fn find_by_token(&self, token: &CorrelationToken) -> Option<&Entry> {
        self.by_token.get(token).and_then(|&i| self.entries.get(i))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries still waiting for confirmation.
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == DeliveryStatus::Sending)
            .count()
    }

    /// Submit text typed by the local user.
    ///
    /// Returns `None` and leaves the sequence untouched when the text is
    /// empty. Whitespace-only text is a normal message.
    pub fn submit(&mut self, text: impl Into<String>) -> Option<Submitted> {
        let text = text.into();
        if text.is_empty() {
            return None;
        }

        let token = self.tokens.next_token();
        let message = ChatMessage::outgoing(&self.local_sender, text, token.clone());
        let index = self.entries.len();

        self.entries.push(Entry {
            message: message.clone(),
            status: DeliveryStatus::Sending,
            is_mine: true,
            submitted_at: Some(Local::now().format("%H:%M:%S").to_string()),
        });
        self.by_token.insert(token, index);

        Some(Submitted { index, message })
    }

    /// Apply a message received from the relay.
    pub fn on_incoming(&mut self, message: ChatMessage) -> SequenceChange {
        let is_mine = message.sender.as_deref() == Some(self.local_sender.as_str());
        let own_token = message
            .correlation_token
            .clone()
            .filter(|_| is_mine && !message.is_synthetic);

        if let Some(token) = &own_token {
            if let Some(&index) = self.by_token.get(token) {
                let entry = &mut self.entries[index];
                entry.message = message;
                entry.status = DeliveryStatus::Delivered;
                return SequenceChange::Replaced { index };
            }
        }

        let index = self.entries.len();
        self.entries.push(Entry {
            message,
            status: DeliveryStatus::Delivered,
            is_mine,
            submitted_at: None,
        });
        if let Some(token) = own_token {
            // Echo of a message sent by another process under the same name.
            self.by_token.insert(token, index);
        }

        SequenceChange::Appended { index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::ServerClock;

    fn confirm(message: &ChatMessage) -> ChatMessage {
        message.clone().stamped(&ServerClock::default())
    }

    #[test]
    fn test_submit_appends_sending_entry() {
        let mut rec = MessageReconciler::new("Ann");
        let submitted = rec.submit("hi").unwrap();

        assert_eq!(submitted.index, 0);
        assert_eq!(rec.len(), 1);
        let entry = rec.get(0).unwrap();
        assert_eq!(entry.status, DeliveryStatus::Sending);
        assert!(entry.is_mine);
        assert!(entry.submitted_at.is_some());
        assert_eq!(entry.message.sender.as_deref(), Some("Ann"));
        assert!(submitted.message.correlation_token.is_some());
        assert_eq!(rec.pending_count(), 1);
    }

    #[test]
    fn test_submit_empty_is_noop() {
        let mut rec = MessageReconciler::new("Ann");
        assert!(rec.submit("").is_none());
        assert!(rec.is_empty());
    }

    #[test]
    fn test_submit_whitespace_is_sent() {
        let mut rec = MessageReconciler::new("Ann");
        let submitted = rec.submit("   ").unwrap();
        assert_eq!(submitted.message.text.as_deref(), Some("   "));
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.get(0).unwrap().status, DeliveryStatus::Sending);
    }

    #[test]
    fn test_confirmation_replaces_in_place() {
        let mut rec = MessageReconciler::new("Ann");
        let submitted = rec.submit("hi").unwrap();

        let change = rec.on_incoming(confirm(&submitted.message));
        assert_eq!(change, SequenceChange::Replaced { index: 0 });
        assert_eq!(rec.len(), 1);

        let entry = rec.get(0).unwrap();
        assert_eq!(entry.status, DeliveryStatus::Delivered);
        assert!(entry.message.is_stamped());
        assert_eq!(rec.pending_count(), 0);
    }

    #[test]
    fn test_repeated_confirmation_is_idempotent() {
        let mut rec = MessageReconciler::new("Ann");
        let submitted = rec.submit("hi").unwrap();
        let token = submitted.message.correlation_token.clone().unwrap();

        rec.on_incoming(confirm(&submitted.message));
        let change = rec.on_incoming(confirm(&submitted.message));

        assert_eq!(change, SequenceChange::Replaced { index: 0 });
        let bearing: Vec<&Entry> = rec
            .entries()
            .iter()
            .filter(|e| e.message.correlation_token.as_ref() == Some(&token))
            .collect();
        assert_eq!(bearing.len(), 1);
        assert_eq!(bearing[0].status, DeliveryStatus::Delivered);
    }

    #[test]
    fn test_confirmations_preserve_submission_order() {
        let mut rec = MessageReconciler::new("Ann");
        let first = rec.submit("one").unwrap();
        let second = rec.submit("two").unwrap();

        // Confirmations arrive in reverse order.
        rec.on_incoming(confirm(&second.message));
        rec.on_incoming(confirm(&first.message));

        let texts: Vec<&str> = rec.entries().iter().map(|e| e.message.body()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(rec
            .entries()
            .iter()
            .all(|e| e.status == DeliveryStatus::Delivered));
    }

    #[test]
    fn test_foreign_sender_with_same_token_is_appended() {
        let mut rec = MessageReconciler::new("Ann");
        let submitted = rec.submit("hi").unwrap();
        let token = submitted.message.correlation_token.clone().unwrap();

        let foreign = confirm(&ChatMessage::outgoing("Bob", "hey", token));
        let change = rec.on_incoming(foreign);

        assert_eq!(change, SequenceChange::Appended { index: 1 });
        assert_eq!(rec.get(0).unwrap().status, DeliveryStatus::Sending);
        let appended = rec.get(1).unwrap();
        assert!(!appended.is_mine);
        assert_eq!(appended.status, DeliveryStatus::Delivered);
    }

    #[test]
    fn test_synthetic_message_is_appended() {
        let mut rec = MessageReconciler::new("Ann");
        rec.submit("hi").unwrap();

        let reply = ChatMessage::synthetic("🤖 ChatBot", "Hello Ann!").stamped(&ServerClock::default());
        let change = rec.on_incoming(reply);

        assert_eq!(change, SequenceChange::Appended { index: 1 });
        assert!(rec.get(1).unwrap().message.correlation_token.is_none());
    }

    #[test]
    fn test_unmatched_own_token_is_appended_once() {
        let mut rec = MessageReconciler::new("Ann");
        // Sent by another device logged in as Ann.
        let other = confirm(&ChatMessage::outgoing(
            "Ann",
            "from phone",
            CorrelationToken::new("phone-0"),
        ));

        assert_eq!(
            rec.on_incoming(other.clone()),
            SequenceChange::Appended { index: 0 }
        );
        assert_eq!(
            rec.on_incoming(other),
            SequenceChange::Replaced { index: 0 }
        );
        assert_eq!(rec.len(), 1);
        assert!(rec.get(0).unwrap().is_mine);
    }

    #[test]
    fn test_incoming_interleaved_with_pending() {
        let mut rec = MessageReconciler::new("Ann");
        let mine = rec.submit("mine").unwrap();
        rec.on_incoming(confirm(&ChatMessage::outgoing(
            "Bob",
            "bob's",
            CorrelationToken::new("bob-0"),
        )));
        rec.on_incoming(confirm(&mine.message));

        let texts: Vec<&str> = rec.entries().iter().map(|e| e.message.body()).collect();
        assert_eq!(texts, vec!["mine", "bob's"]);
        assert_eq!(
            rec.find_by_token(mine.message.correlation_token.as_ref().unwrap())
                .unwrap()
                .status,
            DeliveryStatus::Delivered
        );
    }

    #[test]
    fn test_sequence_change_index() {
        assert_eq!(SequenceChange::Appended { index: 3 }.index(), 3);
        assert_eq!(SequenceChange::Replaced { index: 1 }.index(), 1);
    }
}
