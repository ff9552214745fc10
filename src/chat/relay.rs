//! Broadcast relay for chatrelay.
//!
//! Every inbound message is stamped and fanned out to all connections,
//! the originator included, through a tokio broadcast channel. A delayed
//! responder reply follows each message on the same channel. New
//! connections get one private welcome message.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::message::ChatMessage;
use super::responder::ResponderPolicy;
use crate::config::{Config, RelayConfig};
use crate::datetime::ServerClock;

/// Lifecycle of a relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport accepted, not yet registered.
    Connecting,
    /// Registered and receiving broadcasts.
    Connected,
    /// Released. Terminal.
    Disconnected,
}

impl ConnectionState {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bookkeeping for a live connection.
struct ConnectionInfo {
    connected_at: DateTime<Utc>,
    welcome: AbortHandle,
    /// Only populated when replies are cancelled on disconnect.
    reply_tasks: Vec<AbortHandle>,
}

/// One connection's view of the relay.
///
/// Yields broadcast messages and messages addressed to this connection only.
pub struct RelayConnection {
    id: String,
    state: ConnectionState,
    broadcast: broadcast::Receiver<ChatMessage>,
    direct: mpsc::UnboundedReceiver<ChatMessage>,
}

impl RelayConnection {
    /// Connection ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Wait for the next message for this connection.
    ///
    /// Returns `None` once the relay is gone. A lagging receiver skips the
    /// messages it missed. Cancel safe.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        loop {
            tokio::select! {
                Some(message) = self.direct.recv() => return Some(message),
                result = self.broadcast.recv() => match result {
                    Ok(message) => return Some(message),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            connection_id = %self.id,
                            skipped,
                            "Connection lagged behind broadcast"
                        );
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }
}

/// Single-room broadcast relay.
pub struct BroadcastRelay {
    config: RelayConfig,
    responder: Arc<ResponderPolicy>,
    clock: ServerClock,
    sender: broadcast::Sender<ChatMessage>,
    connections: RwLock<HashMap<String, ConnectionInfo>>,
}

impl BroadcastRelay {
    /// Create a new relay.
    pub fn new(config: RelayConfig, responder: ResponderPolicy, clock: ServerClock) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            config,
            responder: Arc::new(responder),
            clock,
            sender,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Create a relay from the full configuration.
    pub fn from_config(config: &Config) -> Self {
        let clock = ServerClock::from_config(&config.server);
        let responder = ResponderPolicy::from_config(&config.responder, clock.clone());
        Self::new(config.relay.clone(), responder, clock)
    }

    /// Display name used for synthetic messages.
    pub fn bot_name(&self) -> &str {
        &self.config.bot_name
    }

    /// The responder policy.
    pub fn responder(&self) -> &ResponderPolicy {
        &self.responder
    }

    /// Get a receiver for broadcast messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.sender.subscribe()
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// IDs of live connections, sorted by connect time.
    pub async fn connection_ids(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut live: Vec<(&String, DateTime<Utc>)> = connections
            .iter()
            .map(|(id, info)| (id, info.connected_at))
            .collect();
        live.sort_by_key(|(_, connected_at)| *connected_at);
        live.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Check if a connection is live.
    pub async fn is_connected(&self, connection_id: &str) -> bool {
        self.connections.read().await.contains_key(connection_id)
    }

    /// Register a new connection and schedule its welcome message.
    pub async fn open_connection(&self, peer: Option<SocketAddr>) -> RelayConnection {
        let id = format!("ws-{}", Uuid::new_v4());
        let (direct_tx, direct_rx) = mpsc::unbounded_channel();
        let mut connection = RelayConnection {
            id: id.clone(),
            state: ConnectionState::Connecting,
            broadcast: self.sender.subscribe(),
            direct: direct_rx,
        };
        tracing::debug!(connection_id = %id, state = %connection.state, "Connection opening");

        let welcome = ChatMessage::synthetic(&self.config.bot_name, &self.config.welcome_message);
        let clock = self.clock.clone();
        let delay = Duration::from_millis(self.config.welcome_delay_ms);
        let welcome_task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone if the connection closed first.
            let _ = direct_tx.send(welcome.stamped(&clock));
        });

        self.connections.write().await.insert(
            id.clone(),
            ConnectionInfo {
                connected_at: Utc::now(),
                welcome: welcome_task.abort_handle(),
                reply_tasks: Vec::new(),
            },
        );
        connection.state = ConnectionState::Connected;

        tracing::info!(connection_id = %id, peer = ?peer, "Client connected");
        connection
    }

    /// Release a connection.
    ///
    /// Returns false if it was already disconnected.
    pub async fn close_connection(&self, connection: &mut RelayConnection) -> bool {
        if connection.state == ConnectionState::Disconnected {
            return false;
        }
        connection.state = ConnectionState::Disconnected;

        let info = self.connections.write().await.remove(&connection.id);
        if let Some(info) = info {
            info.welcome.abort();
            if self.config.cancel_replies_on_disconnect {
                let pending = info.reply_tasks.iter().filter(|t| !t.is_finished()).count();
                for task in &info.reply_tasks {
                    task.abort();
                }
                if pending > 0 {
                    tracing::debug!(
                        connection_id = %connection.id,
                        cancelled = pending,
                        "Cancelled pending replies"
                    );
                }
            }
        }

        tracing::info!(connection_id = %connection.id, "Client disconnected");
        true
    }

    /// Handle a message received on a connection.
    ///
    /// Stamps it, broadcasts it to every connection and schedules the
    /// responder. Returns the number of receivers of the echo.
    pub async fn on_message(&self, connection_id: &str, message: ChatMessage) -> usize {
        let sender_name = message.sender_name().to_string();
        let text = message.body().to_string();

        tracing::debug!(
            connection_id,
            sender = %sender_name,
            token = ?message.correlation_token,
            "Received chat message"
        );

        let receivers = self.broadcast(message.stamped(&self.clock));

        let reply_task = self.schedule_reply(text, sender_name);
        if self.config.cancel_replies_on_disconnect {
            let mut connections = self.connections.write().await;
            match connections.get_mut(connection_id) {
                Some(info) => {
                    info.reply_tasks.retain(|t| !t.is_finished());
                    info.reply_tasks.push(reply_task);
                }
                // Closed while we were broadcasting.
                None => reply_task.abort(),
            }
        }

        receivers
    }

    /// Broadcast an already stamped message.
    ///
    /// Returns the number of receivers that received the message.
    pub fn broadcast(&self, message: ChatMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    /// Random delay within the configured reply bounds.
    fn reply_delay(&self) -> Duration {
        let min = self.config.reply_delay_min_ms;
        let max = self.config.reply_delay_max_ms.max(min);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Spawn the delayed responder reply.
    fn schedule_reply(&self, text: String, sender_name: String) -> AbortHandle {
        let delay = self.reply_delay();
        let responder = Arc::clone(&self.responder);
        let sender = self.sender.clone();
        let clock = self.clock.clone();
        let bot_name = self.config.bot_name.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reply = responder.reply(&text, &sender_name);
            tracing::info!(reply = %reply, "Responder replying");
            let _ = sender.send(ChatMessage::synthetic(bot_name, reply).stamped(&clock));
        });
        task.abort_handle()
    }
}
