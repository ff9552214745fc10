//! Chat WebSocket handler.
//!
//! Bridges one WebSocket to one relay connection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};

use crate::chat::{BroadcastRelay, RelayConnection};

use super::messages::{ClientMessage, ServerMessage};

type WsSender = SplitSink<WebSocket, Message>;

/// State for WebSocket chat handler.
#[derive(Clone)]
pub struct ChatWsState {
    /// The broadcast relay shared by all connections.
    pub relay: Arc<BroadcastRelay>,
}

impl ChatWsState {
    /// Create a new chat WebSocket state.
    pub fn new(relay: Arc<BroadcastRelay>) -> Self {
        Self { relay }
    }
}

/// WebSocket chat handler.
///
/// GET /ws
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ChatWsState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    tracing::debug!(peer = ?peer, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<ChatWsState>, peer: Option<SocketAddr>) {
    let mut connection = state.relay.open_connection(peer).await;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&mut ws_sender, &state.relay, &connection, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection.id(), "WebSocket closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection.id(), "WebSocket error: {}", e);
                        break;
                    }
                }
            }

            outgoing = connection.recv() => {
                match outgoing {
                    Some(message) => {
                        if send_json(&mut ws_sender, &ServerMessage::ChatMessage(message))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.relay.close_connection(&mut connection).await;
}

/// Handle one text frame from the client.
async fn handle_text(
    ws_sender: &mut WsSender,
    relay: &BroadcastRelay,
    connection: &RelayConnection,
    text: &str,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::ChatMessage(message)) => {
            relay.on_message(connection.id(), message).await;
        }
        Ok(ClientMessage::Ping) => {
            let _ = send_json(ws_sender, &ServerMessage::Pong).await;
        }
        Err(e) => {
            tracing::debug!(connection_id = %connection.id(), "Failed to parse client message: {}", e);
            let error = ServerMessage::error("invalid_message", "Invalid message format");
            let _ = send_json(ws_sender, &error).await;
        }
    }
}

/// Serialize and send a server message.
async fn send_json(ws_sender: &mut WsSender, message: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => ws_sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::warn!("Failed to serialize server message: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_chat_ws_state_new() {
        let relay = Arc::new(BroadcastRelay::from_config(&Config::default()));
        let state = ChatWsState::new(Arc::clone(&relay));
        assert_eq!(state.relay.connection_count().await, 0);
    }
}
