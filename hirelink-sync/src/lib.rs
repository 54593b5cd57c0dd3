//! Client-side conversation sync for the Hirelink marketplace.
//!
//! [`SyncCoordinator`] keeps an inbox of conversation summaries and the
//! thread of the active conversation consistent while snapshot fetches,
//! realtime pushes and send acknowledgments arrive in any order.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod session;
pub mod snapshot;
pub mod transport;
pub mod websocket;

#[cfg(test)]
mod testing;

pub use cache::{CacheStatus, EventOutcome};
pub use config::SyncConfig;
pub use coordinator::{ConnectionState, SyncCoordinator, SyncNotification, ThreadLoad};
pub use error::{AckError, ChannelError, ErrorKind, FetchError, FetchErrorKind, SyncError};
pub use models::input::{SendMessageRequest, ValidateExt};
pub use models::{
    Attachment, Conversation, ConversationId, DeliveryStatus, Enquiry, LastMessage, Message,
    MessageId, MessageKind, MessagePayload, Participant, ParticipantRole, Profile, UserId,
};
pub use session::Session;
pub use snapshot::{HttpSnapshotClient, InboxResponse, SnapshotClient, ThreadResponse};
pub use transport::{ChannelEvent, TransportChannel};
pub use websocket::{MessageEvent, WsMessage, WsTransport};
