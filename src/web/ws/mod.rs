//! WebSocket module for real-time chat.

pub mod chat;
pub mod messages;

pub use chat::{chat_ws_handler, ChatWsState};
pub use messages::{ClientMessage, ServerMessage};
