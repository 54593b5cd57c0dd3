use std::collections::HashMap;

use crate::models::{Conversation, ConversationId};

/// One summary per conversation, in last-written order.
#[derive(Debug, Clone, Default)]
pub struct InboxCache {
    entries: Vec<Conversation>,
    /// id -> position in `entries`
    index: HashMap<ConversationId, usize>,
}

impl InboxCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry with a fresh snapshot. Later duplicates of an id
    /// overwrite earlier ones in place.
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        self.entries.clear();
        self.index.clear();
        for conversation in conversations {
            self.upsert(conversation);
        }
    }

    /// Insert if absent (appended), else overwrite in place. Returns true on insert.
    pub fn upsert(&mut self, conversation: Conversation) -> bool {
        match self.index.get(&conversation.id) {
            Some(&pos) => {
                self.entries[pos] = conversation;
                false
            }
            None => {
                self.index.insert(conversation.id.clone(), self.entries.len());
                self.entries.push(conversation);
                true
            }
        }
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.index.contains_key(id)
    }

    pub fn entries(&self) -> &[Conversation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::conversation;

    fn ids(cache: &InboxCache) -> Vec<&str> {
        cache.entries().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_replace_all_is_wholesale() {
        let mut cache = InboxCache::new();
        cache.replace_all(vec![conversation("a"), conversation("b")]);
        cache.replace_all(vec![conversation("c")]);
        assert_eq!(ids(&cache), vec!["c"]);
        assert!(!cache.contains(&ConversationId::from("a")));
    }

    #[test]
    fn test_upsert_overwrites_in_place_without_resort() {
        let mut cache = InboxCache::new();
        cache.replace_all(vec![conversation("a"), conversation("b"), conversation("c")]);

        let mut updated = conversation("c");
        updated.participants.clear();
        assert!(!cache.upsert(updated));

        assert_eq!(ids(&cache), vec!["a", "b", "c"]);
        assert!(cache
            .get(&ConversationId::from("c"))
            .unwrap()
            .participants
            .is_empty());
    }

    #[test]
    fn test_upsert_on_miss_appends() {
        let mut cache = InboxCache::new();
        cache.replace_all(vec![conversation("a")]);
        assert!(cache.upsert(conversation("z")));
        assert_eq!(ids(&cache), vec!["a", "z"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_snapshot_duplicates_collapse() {
        let mut cache = InboxCache::new();
        cache.replace_all(vec![conversation("a"), conversation("b"), conversation("a")]);
        assert_eq!(ids(&cache), vec!["a", "b"]);
    }
}
