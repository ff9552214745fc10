//! Chat client for chatrelay.
//!
//! Connects to the relay over WebSocket, shows submitted messages
//! immediately and reconciles them with the relay's echo.

mod log;
mod session;

pub use log::{EventLog, LogEntry, LogKind};
pub use session::{ChatClient, ClientEvent, ClientHandle, ClientSnapshot, ConnectionStatus};
