//! Transport channel seam consumed by the coordinator.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ChannelError, SyncError};
use crate::models::input::SendMessageRequest;
use crate::session::Session;
use crate::websocket::MessageEvent;

/// Lifecycle and push notifications delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// First successful handshake of this session.
    Connected,
    /// Handshake succeeded again after a dropped connection.
    Reconnected,
    Disconnected,
    /// Server-initiated `receive_message`.
    Push(MessageEvent),
}

/// Persistent bidirectional event connection to the server.
///
/// Push events arrive in order on a single receiver; acknowledgments carry
/// no ordering guarantee relative to them.
#[async_trait]
pub trait TransportChannel: Send + Sync + 'static {
    async fn connect(&self, session: &Session) -> Result<(), ChannelError>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Request-with-acknowledgment: resolves with the ack's `data`, or with
    /// the ack's `error`, a timeout, or a connection failure.
    async fn send_message(&self, request: SendMessageRequest) -> Result<MessageEvent, SyncError>;

    /// Hands out the push-event receiver. Only the first caller gets it.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>>;
}
