//! Chat module for chatrelay.
//!
//! This module provides:
//! - Correlation tokens for optimistic sends
//! - The client-side message reconciler
//! - The keyword-triggered responder policy
//! - The broadcast relay with delayed synthetic replies

mod message;
mod reconciler;
mod relay;
mod responder;
mod token;

pub use message::{ChatMessage, Origin, PROCESSED_BY_SERVER};
pub use reconciler::{DeliveryStatus, Entry, MessageReconciler, SequenceChange, Submitted};
pub use relay::{BroadcastRelay, ConnectionState, RelayConnection};
pub use responder::{Category, ReplyTemplate, ResponderPolicy};
pub use token::{CorrelationToken, TokenGenerator};
