//! Web server for chatrelay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::chat::BroadcastRelay;
use crate::config::{Config, ServerConfig};
use crate::{RelayError, Result};

use super::router::create_router;

/// HTTP/WebSocket server hosting the relay.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// The relay shared by all connections.
    relay: Arc<BroadcastRelay>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server around an existing relay.
    pub fn new(config: &ServerConfig, relay: Arc<BroadcastRelay>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                RelayError::Config(format!(
                    "invalid server address {}:{}: {e}",
                    config.host, config.port
                ))
            })?;

        Ok(Self {
            addr,
            relay,
            cors_origins: config.cors_origins.clone(),
        })
    }

    /// Create a new web server and relay from the full configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.server, Arc::new(BroadcastRelay::from_config(config)))
    }

    /// Get the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the relay.
    pub fn relay(&self) -> Arc<BroadcastRelay> {
        Arc::clone(&self.relay)
    }

    fn router(&self) -> Router {
        create_router(Arc::clone(&self.relay), &self.cors_origins)
    }

    /// Run the web server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the web server until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Chat relay listening on ws://{}/ws", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        let open = self.relay.connection_ids().await;
        if !open.is_empty() {
            tracing::info!(connections = ?open, "Stopped with connections still open");
        }
        tracing::info!("Chat relay stopped");
        Ok(())
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Chat relay listening on ws://{}/ws", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received SIGINT, shutting down...");
}
