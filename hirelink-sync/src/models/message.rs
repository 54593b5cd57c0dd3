use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{ConversationId, UserId};

string_id!(
    /// Server-assigned message identifier, unique within a thread.
    MessageId
);

const MAX_MESSAGE_LENGTH: usize = 10000;
const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 5000;
const MAX_ATTACHMENTS: usize = 10;
const MAX_URL_LENGTH: usize = 2048;

fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[garde(context(()))]
pub struct Attachment {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(length(min = 1, max = MAX_URL_LENGTH))]
    pub url: String,
}

/// A structured question about a job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[garde(context(()))]
pub struct Enquiry {
    #[garde(length(min = 1, max = MAX_TITLE_LENGTH), custom(not_blank))]
    pub title: String,
    #[garde(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: String,
    #[serde(default)]
    #[garde(length(max = MAX_ATTACHMENTS), dive)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub job_id: Option<String>,
}

/// Body of a message, tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(tag = "type", rename_all = "lowercase")]
#[garde(context(()))]
pub enum MessagePayload {
    Text {
        #[garde(length(min = 1, max = MAX_MESSAGE_LENGTH), custom(not_blank))]
        content: String,
    },
    Enquiry {
        #[garde(dive)]
        enquiry: Enquiry,
    },
}

impl MessagePayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Enquiry { .. } => MessageKind::Enquiry,
        }
    }

    /// Short text shown in inbox rows.
    pub fn preview(&self) -> &str {
        match self {
            Self::Text { content } => content,
            Self::Enquiry { enquiry } => &enquiry.title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Enquiry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    #[serde(flatten)]
    pub payload: MessagePayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl Message {
    /// True when the message was sent by `current_user`.
    pub fn is_outgoing(&self, current_user: &UserId) -> bool {
        &self.sender_id == current_user
    }
}
