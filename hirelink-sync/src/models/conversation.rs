use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Message, MessageId, MessageKind, Participant, UserId};

string_id!(
    /// Identifier of a conversation (inbox entry).
    ConversationId
);

/// Summary of the latest message shown in the inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            kind: message.payload.kind(),
            content: message.payload.preview().to_string(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// The first participant that is not `current_user`.
    pub fn counterpart(&self, current_user: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id != current_user)
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| &p.id == user_id)
    }

    /// Records `message` as the latest message of this conversation.
    pub fn with_last_message(mut self, message: &Message) -> Self {
        self.last_message = Some(LastMessage::from(message));
        if message.updated_at > self.updated_at {
            self.updated_at = message.updated_at;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryStatus, MessagePayload, ParticipantRole};
    use chrono::TimeZone;

    fn participant(id: &str, role: ParticipantRole) -> Participant {
        Participant {
            id: UserId::from(id),
            display_name: id.to_uppercase(),
            company_name: None,
            role,
            avatar_url: None,
        }
    }

    fn conversation() -> Conversation {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        Conversation {
            id: ConversationId::from("c1"),
            participants: vec![
                participant("cand", ParticipantRole::Candidate),
                participant("emp", ParticipantRole::Employer),
            ],
            last_message: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_counterpart_skips_current_user() {
        let conv = conversation();
        assert_eq!(
            conv.counterpart(&UserId::from("cand")).map(|p| p.id.as_str()),
            Some("emp")
        );
        assert_eq!(
            conv.counterpart(&UserId::from("emp")).map(|p| p.id.as_str()),
            Some("cand")
        );
        assert!(conv.has_participant(&UserId::from("emp")));
        assert!(!conv.has_participant(&UserId::from("other")));
    }

    #[test]
    fn test_with_last_message_stamps_summary() {
        let at = Utc.with_ymd_and_hms(2024, 1, 11, 12, 0, 0).unwrap();
        let message = Message {
            id: MessageId::from("m7"),
            conversation_id: ConversationId::from("c1"),
            sender_id: UserId::from("emp"),
            payload: MessagePayload::text("Interview at noon?"),
            created_at: at,
            updated_at: at,
            status: DeliveryStatus::Sent,
        };

        let conv = conversation().with_last_message(&message);
        let last = conv.last_message.unwrap();
        assert_eq!(last.id, MessageId::from("m7"));
        assert_eq!(last.content, "Interview at noon?");
        assert_eq!(last.kind, MessageKind::Text);
        assert_eq!(conv.updated_at, at);
    }

    #[test]
    fn test_last_message_wire_shape() {
        let json = r#"{
            "id": "c2",
            "participants": [],
            "lastMessage": {
                "id": "m1",
                "senderId": "u1",
                "type": "enquiry",
                "content": "Night shifts",
                "createdAt": "2024-02-02T10:00:00Z"
            },
            "createdAt": "2024-02-01T10:00:00Z",
            "updatedAt": "2024-02-02T10:00:00Z"
        }"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.last_message.unwrap().kind, MessageKind::Enquiry);
    }
}
