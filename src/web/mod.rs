//! Web module for chatrelay.
//!
//! Exposes the relay over WebSocket at `/ws`, with a `/health` check.

pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use router::create_router;
pub use server::WebServer;
