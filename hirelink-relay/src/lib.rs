//! HireLink development relay.
//!
//! Serves the realtime message channel over WebSocket and the inbox/thread
//! snapshots over HTTP from one in-memory store. Exposed as a library so
//! integration tests can run it on ephemeral ports.

mod connection;
mod http;
mod state;
mod store;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing::{error, info};

pub use connection::{handle_connection, handle_message};
pub use http::{build_router, ApiError, Caller};
pub use state::ServerState;
pub use store::{ConversationStore, StoreError};

/// Accept WebSocket clients on `listener` until the task is dropped.
pub async fn serve_websocket(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!("New connection from {}", peer_addr);

                let state = state.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws_stream) => {
                            handle_connection(ws_stream, state).await;
                        }
                        Err(e) => {
                            error!("WebSocket handshake failed for {}: {}", peer_addr, e);
                        }
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Serve the snapshot endpoints on `listener`.
pub async fn serve_http(listener: TcpListener, state: Arc<ServerState>) -> std::io::Result<()> {
    axum::serve(listener, build_router(state)).await
}
