use super::{CacheStatus, InboxCache, ThreadCache};
use crate::error::ErrorKind;
use crate::models::{Conversation, ConversationId, Message};
use crate::websocket::MessageEvent;

/// Identifies one thread fetch: the conversation it was issued for and the
/// selection generation current at that time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTicket {
    pub conversation_id: ConversationId,
    pub generation: u64,
}

/// Identifies one inbox fetch; only the most recently issued one may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxTicket {
    pub seq: u64,
}

/// Whether a snapshot was applied or rejected as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotApply {
    Applied,
    Discarded,
}

/// What a message event (ack or push) changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// The conversation was unknown to the inbox and got inserted.
    pub inbox_inserted: bool,
    /// The message was added to the active thread.
    pub thread_appended: bool,
}

/// Everything the coordinator owns, mutated only through the reducers below.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    inbox: InboxCache,
    thread: ThreadCache,
    active: Option<ConversationId>,
    /// Bumped on every active-pointer change and every active-thread fetch.
    generation: u64,
    /// Bumped on every inbox fetch.
    inbox_seq: u64,
    inbox_status: CacheStatus,
    thread_status: CacheStatus,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inbox(&self) -> &InboxCache {
        &self.inbox
    }

    pub fn thread(&self) -> &ThreadCache {
        &self.thread
    }

    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn inbox_status(&self) -> CacheStatus {
        self.inbox_status
    }

    pub fn thread_status(&self) -> CacheStatus {
        self.thread_status
    }

    pub fn begin_inbox_load(&mut self) -> InboxTicket {
        self.inbox_seq += 1;
        self.inbox_status = CacheStatus::Loading;
        InboxTicket {
            seq: self.inbox_seq,
        }
    }

    /// Replace the inbox unless a newer fetch was issued after `ticket`.
    pub fn apply_inbox_snapshot(
        &mut self,
        ticket: &InboxTicket,
        conversations: Vec<Conversation>,
    ) -> SnapshotApply {
        if ticket.seq != self.inbox_seq {
            return SnapshotApply::Discarded;
        }
        self.inbox.replace_all(conversations);
        self.inbox_status = CacheStatus::Ready;
        SnapshotApply::Applied
    }

    pub fn fail_inbox_load(&mut self, ticket: &InboxTicket, kind: ErrorKind) -> SnapshotApply {
        if ticket.seq != self.inbox_seq {
            return SnapshotApply::Discarded;
        }
        self.inbox_status = CacheStatus::Failed(kind);
        SnapshotApply::Applied
    }

    /// Point at `id` and clear the thread. Returns `None` when `id` is
    /// already active.
    pub fn select(&mut self, id: ConversationId) -> Option<ThreadTicket> {
        if self.active.as_ref() == Some(&id) {
            return None;
        }
        self.generation += 1;
        self.active = Some(id.clone());
        self.thread.clear();
        self.thread_status = CacheStatus::Loading;
        Some(ThreadTicket {
            conversation_id: id,
            generation: self.generation,
        })
    }

    /// Drop the active pointer and the thread content.
    pub fn deselect(&mut self) -> bool {
        if self.active.take().is_none() {
            return false;
        }
        self.generation += 1;
        self.thread.clear();
        self.thread_status = CacheStatus::Empty;
        true
    }

    /// Ticket for a fetch of `id` issued now. When `id` is active the
    /// generation is bumped, so earlier fetches of it become stale.
    pub fn begin_thread_load(&mut self, id: ConversationId) -> ThreadTicket {
        if self.active.as_ref() == Some(&id) {
            self.generation += 1;
            self.thread_status = CacheStatus::Loading;
        }
        ThreadTicket {
            conversation_id: id,
            generation: self.generation,
        }
    }

    fn ticket_is_current(&self, ticket: &ThreadTicket) -> bool {
        self.active.as_ref() == Some(&ticket.conversation_id)
            && self.generation == ticket.generation
    }

    /// Switch-away guard: replace the thread only if the ticket still
    /// matches the active pointer and selection generation.
    pub fn apply_thread_snapshot(
        &mut self,
        ticket: &ThreadTicket,
        messages: Vec<Message>,
    ) -> SnapshotApply {
        if !self.ticket_is_current(ticket) {
            return SnapshotApply::Discarded;
        }
        self.thread.replace_all(messages);
        self.thread_status = CacheStatus::Ready;
        SnapshotApply::Applied
    }

    pub fn fail_thread_load(&mut self, ticket: &ThreadTicket, kind: ErrorKind) -> SnapshotApply {
        if !self.ticket_is_current(ticket) {
            return SnapshotApply::Discarded;
        }
        self.thread_status = CacheStatus::Failed(kind);
        SnapshotApply::Applied
    }

    /// Apply a message together with its conversation summary in one step:
    /// the conversation is always upserted (with `message` as its last
    /// message), the message is appended only to the active thread.
    pub fn apply_message_event(&mut self, event: MessageEvent) -> EventOutcome {
        let MessageEvent {
            message,
            conversation,
        } = event;

        let conversation = conversation.with_last_message(&message);
        let inbox_inserted = self.inbox.upsert(conversation);

        let thread_appended = self.active.as_ref() == Some(&message.conversation_id)
            && self.thread.append(message);

        EventOutcome {
            inbox_inserted,
            thread_appended,
        }
    }
}
