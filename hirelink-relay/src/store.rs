use chrono::Utc;
use dashmap::DashMap;
use hirelink_sync::{
    Conversation, ConversationId, DeliveryStatus, Message, MessageEvent, MessageId, Participant,
    SendMessageRequest, UserId,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("cannot send a message to yourself")]
    SelfMessage,

    #[error("conversation {0} not found")]
    NotFound(ConversationId),

    #[error("not a participant of conversation {0}")]
    Forbidden(ConversationId),
}

/// In-memory conversations and messages.
#[derive(Default)]
pub struct ConversationStore {
    /// user_id -> profile shown to the other participant
    profiles: DashMap<UserId, Participant>,
    conversations: DashMap<ConversationId, Conversation>,
    /// Ordered (lower, higher) user pair -> conversation
    pairs: DashMap<(UserId, UserId), ConversationId>,
    messages: DashMap<ConversationId, Vec<Message>>,
}

fn pair_key(a: &UserId, b: &UserId) -> (UserId, UserId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_profile(&self, profile: Participant) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    fn profile(&self, id: &UserId) -> Participant {
        self.profiles
            .get(id)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| Participant::placeholder(id.clone()))
    }

    /// Conversation between `a` and `b`, created on first use.
    pub fn find_or_create(&self, a: &UserId, b: &UserId) -> ConversationId {
        let entry = self.pairs.entry(pair_key(a, b)).or_insert_with(|| {
            let now = Utc::now();
            let conversation = Conversation {
                id: ConversationId::new(Uuid::new_v4().to_string()),
                participants: vec![self.profile(a), self.profile(b)],
                last_message: None,
                created_at: now,
                updated_at: now,
            };
            info!(conversation_id = %conversation.id, "Conversation created");
            let id = conversation.id.clone();
            self.conversations.insert(id.clone(), conversation);
            id
        });
        entry.value().clone()
    }

    /// Store a message from `sender` and return it with the updated summary.
    pub fn record_message(
        &self,
        sender: &UserId,
        request: SendMessageRequest,
    ) -> Result<MessageEvent, StoreError> {
        if sender == &request.recipient_id {
            return Err(StoreError::SelfMessage);
        }

        let conversation_id = self.find_or_create(sender, &request.recipient_id);
        let now = Utc::now();
        let message = Message {
            id: MessageId::new(Uuid::new_v4().to_string()),
            conversation_id: conversation_id.clone(),
            sender_id: sender.clone(),
            payload: request.payload,
            created_at: now,
            updated_at: now,
            status: DeliveryStatus::Sent,
        };

        let conversation = {
            let mut entry = self
                .conversations
                .get_mut(&conversation_id)
                .ok_or_else(|| StoreError::NotFound(conversation_id.clone()))?;
            let mut updated = entry.value().clone().with_last_message(&message);
            // Profiles registered after the conversation was created
            for participant in &mut updated.participants {
                if let Some(profile) = self.profiles.get(&participant.id) {
                    *participant = profile.value().clone();
                }
            }
            *entry = updated.clone();
            updated
        };

        self.messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());

        Ok(MessageEvent {
            message,
            conversation,
        })
    }

    /// Conversations of `user`, most recently updated first.
    pub fn inbox_for(&self, user: &UserId) -> Vec<Conversation> {
        let mut inbox: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.has_participant(user))
            .map(|c| c.value().clone())
            .collect();
        inbox.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        inbox
    }

    /// Messages of one conversation, oldest first.
    pub fn thread_for(
        &self,
        user: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        let conversation = self
            .conversations
            .get(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.clone()))?;
        if !conversation.has_participant(user) {
            return Err(StoreError::Forbidden(conversation_id.clone()));
        }
        drop(conversation);

        Ok(self
            .messages
            .get(conversation_id)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }
}
