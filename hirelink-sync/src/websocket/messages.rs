use serde::{Deserialize, Serialize};

use crate::error::AckError;
use crate::models::input::SendMessageRequest;
use crate::models::{Conversation, Message, Profile, UserId};

/// A message together with the updated summary of its conversation.
///
/// Carried both by send acknowledgments and by `receive_message` pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message: Message,
    pub conversation: Conversation,
}

/// WebSocket frames (shared between relay and client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WsMessage {
    Connect {
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<Profile>,
    },
    AuthResponse {
        success: bool,
        message: String,
    },
    SendMessage {
        request_id: String,
        request: SendMessageRequest,
    },
    Ack {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<MessageEvent>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ReceiveMessage(MessageEvent),
    Error {
        message: String,
    },
}

impl WsMessage {
    pub fn ack_ok(request_id: impl Into<String>, event: MessageEvent) -> Self {
        Self::Ack {
            request_id: request_id.into(),
            data: Some(event),
            error: None,
        }
    }

    pub fn ack_err(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Ack {
            request_id: request_id.into(),
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Resolve an ack body; exactly one of `data` / `error` must be present.
pub fn ack_outcome(
    data: Option<MessageEvent>,
    error: Option<String>,
) -> Result<MessageEvent, AckError> {
    match (data, error) {
        (Some(event), None) => Ok(event),
        (None, Some(error)) => Err(AckError::Rejected(error)),
        _ => Err(AckError::Malformed),
    }
}
