//! Error taxonomy for the sync core.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::models::ConversationId;

/// Why a snapshot request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    Unauthorized,
    Status(u16),
    Decode,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Timeout => f.write_str("timeout"),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::Status(code) => write!(f, "http {}", code),
            Self::Decode => f.write_str("decode"),
        }
    }
}

/// A snapshot request failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch failed ({kind}): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The server rejected or never answered a send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AckError {
    #[error("server rejected message: {0}")]
    Rejected(String),

    #[error("no acknowledgment within {0:?}")]
    Timeout(Duration),

    #[error("acknowledgment carried neither data nor error")]
    Malformed,
}

/// Transport connection problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("not connected to server")]
    NotConnected,

    #[error("connection lost before acknowledgment")]
    Disconnected,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("push events already taken by another subscriber")]
    AlreadySubscribed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Coarse error category passed through to UI collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    Unauthorized,
    Server,
    Decode,
    Rejected,
    Disconnected,
    Validation,
    State,
}

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Ack(#[from] AckError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("no active conversation")]
    NoActiveConversation,

    #[error("no counterpart participant in conversation {0}")]
    NoRecipient(ConversationId),

    #[error("invalid message payload: {0}")]
    InvalidPayload(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(e) => match e.kind {
                FetchErrorKind::Network => ErrorKind::Network,
                FetchErrorKind::Timeout => ErrorKind::Timeout,
                FetchErrorKind::Unauthorized => ErrorKind::Unauthorized,
                FetchErrorKind::Status(_) => ErrorKind::Server,
                FetchErrorKind::Decode => ErrorKind::Decode,
            },
            Self::Ack(AckError::Rejected(_)) => ErrorKind::Rejected,
            Self::Ack(AckError::Timeout(_)) => ErrorKind::Timeout,
            Self::Ack(AckError::Malformed) => ErrorKind::Decode,
            Self::Channel(ChannelError::AuthFailed(_)) => ErrorKind::Unauthorized,
            Self::Channel(ChannelError::Protocol(_)) => ErrorKind::Decode,
            Self::Channel(ChannelError::AlreadySubscribed) => ErrorKind::State,
            Self::Channel(_) => ErrorKind::Disconnected,
            Self::NoActiveConversation | Self::NoRecipient(_) => ErrorKind::State,
            Self::InvalidPayload(_) => ErrorKind::Validation,
        }
    }
}
