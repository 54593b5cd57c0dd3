use std::collections::HashSet;

use crate::models::{Message, MessageId};

/// Ordered messages of the active conversation, unique by id.
#[derive(Debug, Clone, Default)]
pub struct ThreadCache {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl ThreadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the thread with `messages`, keeping the first copy of any
    /// repeated id.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.clear();
        for message in messages {
            self.append(message);
        }
    }

    /// Append unless a message with the same id is already present.
    /// Returns true when the message was added.
    pub fn append(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
