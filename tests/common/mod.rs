//! Test helpers for end-to-end relay tests.
//!
//! Starts a real relay on an ephemeral port with short delays and provides
//! helpers for both the crate's client and raw WebSocket connections.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chatrelay::chat::{Entry, SequenceChange};
use chatrelay::client::{ChatClient, ClientEvent, ClientHandle, ConnectionStatus};
use chatrelay::config::{ClientConfig, Config};
use chatrelay::web::ws::ServerMessage;
use chatrelay::WebServer;

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub type RawSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay configuration with short delays for tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.relay.welcome_delay_ms = 0;
    config.relay.reply_delay_min_ms = 20;
    config.relay.reply_delay_max_ms = 40;
    config
}

/// Start a relay and return its address.
pub async fn start_server(config: &Config) -> SocketAddr {
    WebServer::from_config(config)
        .unwrap()
        .run_with_addr()
        .await
        .unwrap()
}

/// Connect a chat client and wait until it is connected.
pub async fn connect_client(
    addr: SocketAddr,
    name: &str,
) -> (ClientHandle, UnboundedReceiver<ClientEvent>) {
    let config = ClientConfig {
        server_url: format!("ws://{addr}/ws"),
        debug_log_capacity: 50,
    };
    let (handle, events) = ChatClient::connect(&config, name);
    let status = timeout(
        DEFAULT_TIMEOUT,
        handle.wait_for_status(|s| s != ConnectionStatus::Connecting),
    )
    .await
    .expect("timed out connecting")
    .unwrap();
    assert_eq!(status, ConnectionStatus::Connected);
    (handle, events)
}

/// Wait for the next sequence change, skipping status and log events.
pub async fn next_sequence(events: &mut UnboundedReceiver<ClientEvent>) -> (SequenceChange, Entry) {
    timeout(DEFAULT_TIMEOUT, async {
        loop {
            match events.recv().await {
                Some(ClientEvent::Sequence { change, entry }) => return (change, entry),
                Some(_) => continue,
                None => panic!("client event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for sequence change")
}

/// Open a raw WebSocket to the relay.
pub async fn connect_raw(addr: SocketAddr) -> RawSocket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    socket
}

/// Send a raw text frame.
pub async fn send_raw(socket: &mut RawSocket, text: &str) {
    socket.send(Message::Text(text.to_string())).await.unwrap();
}

/// Receive the next server message on a raw socket.
pub async fn recv_raw(socket: &mut RawSocket) -> ServerMessage {
    timeout(DEFAULT_TIMEOUT, async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for server message")
}

/// Receive the next server message as raw JSON.
pub async fn recv_raw_json(socket: &mut RawSocket) -> serde_json::Value {
    timeout(DEFAULT_TIMEOUT, async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for server message")
}
