//! Chat client session.
//!
//! One spawned task owns the WebSocket, the message reconciler and the
//! diagnostic log. User commands arrive on a channel and are `select!`ed
//! with inbound frames, so submits and incoming messages never interleave.

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::log::{EventLog, LogEntry, LogKind};
use crate::chat::{Entry, MessageReconciler, SequenceChange};
use crate::config::ClientConfig;
use crate::web::ws::{ClientMessage, ServerMessage};
use crate::{RelayError, Result};

/// Connection status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Connecting to the relay.
    Connecting,
    /// Connected.
    Connected,
    /// Connection closed.
    Disconnected,
    /// Connection attempt failed.
    Error,
}

impl ConnectionStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events for the presentation layer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connection status changed.
    Status(ConnectionStatus),
    /// The message sequence changed; `entry` is the affected entry.
    Sequence {
        /// What changed.
        change: SequenceChange,
        /// The entry after the change.
        entry: Entry,
    },
    /// A diagnostic log entry was recorded.
    Log(LogEntry),
}

/// Point-in-time copy of the client state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Connection status.
    pub status: ConnectionStatus,
    /// Message sequence in display order.
    pub entries: Vec<Entry>,
    /// Diagnostic log, oldest first.
    pub log: Vec<LogEntry>,
}

enum Command {
    Submit(String),
    Snapshot(oneshot::Sender<ClientSnapshot>),
    ClearLog,
    Disconnect,
}

/// Handle for driving a client session.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ClientHandle {
    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Wait until the status satisfies `predicate`.
    pub async fn wait_for_status(
        &self,
        predicate: impl Fn(ConnectionStatus) -> bool,
    ) -> Result<ConnectionStatus> {
        let mut status = self.status.clone();
        let current = status
            .wait_for(|s| predicate(*s))
            .await
            .map_err(|_| RelayError::NotConnected)?;
        Ok(*current)
    }

    /// Submit text as the local user.
    ///
    /// Empty text is ignored. Fails with `NotConnected` when there is no live
    /// transport, in which case nothing is recorded.
    pub fn submit(&self, text: impl Into<String>) -> Result<()> {
        if self.status() != ConnectionStatus::Connected {
            return Err(RelayError::NotConnected);
        }
        self.commands
            .send(Command::Submit(text.into()))
            .map_err(|_| RelayError::NotConnected)
    }

    /// Get a copy of the current state.
    pub async fn snapshot(&self) -> Result<ClientSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| RelayError::NotConnected)?;
        rx.await.map_err(|_| RelayError::NotConnected)
    }

    /// Clear the diagnostic log.
    pub fn clear_log(&self) -> Result<()> {
        self.commands
            .send(Command::ClearLog)
            .map_err(|_| RelayError::NotConnected)
    }

    /// Close the connection.
    pub fn disconnect(&self) -> Result<()> {
        self.commands
            .send(Command::Disconnect)
            .map_err(|_| RelayError::NotConnected)
    }
}

/// Chat client entry point.
pub struct ChatClient;

impl ChatClient {
    /// Start a session for `username` against the configured relay.
    ///
    /// Connection happens in the background; watch the `Status` events.
    pub fn connect(
        config: &ClientConfig,
        username: impl Into<String>,
    ) -> (ClientHandle, mpsc::UnboundedReceiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        let session = Session {
            reconciler: MessageReconciler::new(username),
            log: EventLog::new(config.debug_log_capacity),
            status: status_tx,
            events: event_tx,
        };
        tokio::spawn(session.run(config.server_url.clone(), command_rx));

        let handle = ClientHandle {
            commands: command_tx,
            status: status_rx,
        };
        (handle, event_rx)
    }
}

/// Encode a frame for the wire.
fn encode(frame: &ClientMessage) -> Result<String> {
    Ok(serde_json::to_string(frame)?)
}

/// State owned by the session task.
struct Session {
    reconciler: MessageReconciler,
    log: EventLog,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Session {
    async fn run(mut self, url: String, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.set_status(ConnectionStatus::Connecting);

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                tracing::info!(url = %url, "Connected to relay");
                self.record(LogKind::Connect, format!("Connected to {url}"));
                self.set_status(ConnectionStatus::Connected);

                let (mut write, mut read) = stream.split();
                let mut stopped = false;

                while !stopped {
                    tokio::select! {
                        frame = read.next() => match frame {
                            Some(Ok(WsMessage::Text(text))) => self.on_frame(&text),
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                let e = RelayError::from(e);
                                tracing::warn!("WebSocket error: {}", e);
                                self.record(LogKind::Error, format!("Transport error: {e}"));
                                break;
                            }
                        },
                        command = commands.recv() => match command {
                            Some(Command::Submit(text)) => {
                                let Some(frame) = self.submit(text) else {
                                    continue;
                                };
                                let sent = write
                                    .send(WsMessage::Text(frame))
                                    .await
                                    .map_err(RelayError::from);
                                if let Err(e) = sent {
                                    tracing::warn!("Failed to send message: {}", e);
                                    self.record(LogKind::Error, format!("Send failed: {e}"));
                                    break;
                                }
                            }
                            Some(Command::Disconnect) | None => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                stopped = true;
                            }
                            Some(other) => self.on_local_command(other),
                        },
                    }
                }

                tracing::info!("Disconnected from relay");
                self.record(LogKind::Disconnect, "Disconnected from server");
                self.set_status(ConnectionStatus::Disconnected);
            }
            Err(e) => {
                let e = RelayError::from(e);
                tracing::warn!(url = %url, "Connection error: {}", e);
                self.record(LogKind::Error, format!("Connection error: {e}"));
                self.set_status(ConnectionStatus::Error);
            }
        }

        // No transport any more: serve snapshots until the handle goes away.
        while let Some(command) = commands.recv().await {
            match command {
                Command::Submit(_) => tracing::debug!("Ignoring submit without transport"),
                Command::Disconnect => {}
                other => self.on_local_command(other),
            }
        }
    }

    /// Commands that don't touch the transport.
    fn on_local_command(&mut self, command: Command) {
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(ClientSnapshot {
                    status: *self.status.borrow(),
                    entries: self.reconciler.entries().to_vec(),
                    log: self.log.entries(),
                });
            }
            Command::ClearLog => self.log.clear(),
            Command::Submit(_) | Command::Disconnect => {}
        }
    }

    /// Record a pending entry and return the frame to send.
    fn submit(&mut self, text: String) -> Option<String> {
        let submitted = self.reconciler.submit(text)?;
        let frame = ClientMessage::ChatMessage(submitted.message.clone());

        let json = match encode(&frame) {
            Ok(json) => json,
            Err(e) => {
                self.record(LogKind::Error, format!("Failed to encode message: {e}"));
                return None;
            }
        };

        self.record_with_data(LogKind::Send, "Sending message to server", &submitted.message);
        self.emit_sequence(SequenceChange::Appended {
            index: submitted.index,
        });
        Some(json)
    }

    /// Handle a text frame from the relay.
    fn on_frame(&mut self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::ChatMessage(message)) => {
                self.record_with_data(LogKind::Receive, "Message received from server", &message);
                let sender = message.sender_name().to_string();
                let change = self.reconciler.on_incoming(message);
                match change {
                    SequenceChange::Replaced { .. } => {
                        self.record(LogKind::Update, "Updated local message with server response")
                    }
                    SequenceChange::Appended { .. } => {
                        self.record(LogKind::Message, format!("New message from {sender}"))
                    }
                }
                self.emit_sequence(change);
            }
            Ok(ServerMessage::Pong) => tracing::trace!("Pong"),
            Ok(ServerMessage::Error { code, message }) => {
                self.record(LogKind::Error, format!("Server error {code}: {message}"));
            }
            Err(e) => {
                tracing::debug!("Failed to parse server message: {}", e);
                self.record(LogKind::Error, format!("Unreadable frame: {e}"));
            }
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status.send_replace(status);
        let _ = self.events.send(ClientEvent::Status(status));
    }

    fn emit_sequence(&self, change: SequenceChange) {
        if let Some(entry) = self.reconciler.get(change.index()) {
            let _ = self.events.send(ClientEvent::Sequence {
                change,
                entry: entry.clone(),
            });
        }
    }

    fn record(&mut self, kind: LogKind, message: impl Into<String>) {
        let entry = self.log.push(kind, message);
        let _ = self.events.send(ClientEvent::Log(entry));
    }

    fn record_with_data<T: serde::Serialize>(
        &mut self,
        kind: LogKind,
        message: impl Into<String>,
        data: &T,
    ) {
        let entry = self.log.push_with_data(kind, message, data);
        let _ = self.events.send(ClientEvent::Log(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_as_str() {
        assert_eq!(ConnectionStatus::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionStatus::Connected.as_str(), "connected");
        assert_eq!(ConnectionStatus::Disconnected.as_str(), "disconnected");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_encode_chat_frame() {
        let message = crate::chat::ChatMessage::outgoing(
            "Ann",
            "hi",
            crate::chat::CorrelationToken::new("t-1"),
        );
        let json = encode(&ClientMessage::ChatMessage(message)).unwrap();
        assert!(json.starts_with(r#"{"type":"chat_message""#));
        assert!(json.contains(r#""correlation_token":"t-1""#));
    }

    #[tokio::test]
    async fn test_connect_error_sets_status() {
        let config = ClientConfig {
            // Port 9 (discard) on localhost is closed in test environments.
            server_url: "ws://127.0.0.1:9/ws".to_string(),
            debug_log_capacity: 10,
        };
        let (handle, mut events) = ChatClient::connect(&config, "Ann");

        let status = handle
            .wait_for_status(|s| s != ConnectionStatus::Connecting)
            .await
            .unwrap();
        assert_eq!(status, ConnectionStatus::Error);

        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::Status(ConnectionStatus::Connecting))
        ));

        assert!(matches!(handle.submit("hi"), Err(RelayError::NotConnected)));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.status, ConnectionStatus::Error);
        let error = snapshot
            .log
            .iter()
            .find(|e| e.kind == LogKind::Error)
            .unwrap();
        assert!(error.message.contains("websocket error"));

        handle.clear_log().unwrap();
        assert!(handle.snapshot().await.unwrap().log.is_empty());
    }
}
