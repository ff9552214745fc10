//! chatrelay - real-time broadcast chat relay.
//!
//! A WebSocket relay that stamps and fans out every message to all
//! connected clients, answers with an automated responder, and a client
//! that reconciles optimistic local messages with the relay's echo.

pub mod chat;
pub mod client;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod web;

pub use chat::{
    BroadcastRelay, ChatMessage, CorrelationToken, DeliveryStatus, Entry, MessageReconciler,
    Origin, ResponderPolicy, SequenceChange, TokenGenerator,
};
pub use client::{ChatClient, ClientEvent, ClientHandle, ConnectionStatus};
pub use config::Config;
pub use error::{RelayError, Result};
pub use web::WebServer;
