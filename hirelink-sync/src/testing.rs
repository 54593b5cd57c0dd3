//! Fixtures and in-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ChannelError, FetchError, SyncError};
use crate::models::input::SendMessageRequest;
use crate::models::{
    Conversation, ConversationId, DeliveryStatus, Message, MessageId, MessagePayload,
    Participant, ParticipantRole, UserId,
};
use crate::session::Session;
use crate::snapshot::SnapshotClient;
use crate::transport::{ChannelEvent, TransportChannel};
use crate::websocket::MessageEvent;

pub const ME: &str = "me";

pub fn participant(id: &str) -> Participant {
    Participant {
        id: UserId::from(id),
        display_name: id.to_string(),
        company_name: None,
        role: ParticipantRole::Candidate,
        avatar_url: None,
    }
}

/// Conversation between [`ME`] and `peer-<id>`.
pub fn conversation(id: &str) -> Conversation {
    let at = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
    Conversation {
        id: ConversationId::from(id),
        participants: vec![participant(ME), participant(&format!("peer-{}", id))],
        last_message: None,
        created_at: at,
        updated_at: at,
    }
}

pub fn text_message(id: &str, conversation_id: &str, sender: &str, content: &str) -> Message {
    let at = Utc.with_ymd_and_hms(2024, 4, 1, 12, 30, 0).unwrap();
    Message {
        id: MessageId::from(id),
        conversation_id: ConversationId::from(conversation_id),
        sender_id: UserId::from(sender),
        payload: MessagePayload::text(content),
        created_at: at,
        updated_at: at,
        status: DeliveryStatus::Sent,
    }
}

pub fn message_event(id: &str, conversation_id: &str, sender: &str, content: &str) -> MessageEvent {
    let message = text_message(id, conversation_id, sender, content);
    let conversation = conversation(conversation_id).with_last_message(&message);
    MessageEvent {
        message,
        conversation,
    }
}

/// Snapshot client serving canned data, with optional gates that hold a
/// fetch open until the test releases it.
#[derive(Default)]
pub struct FakeSnapshot {
    inbox: Mutex<Option<Result<Vec<Conversation>, FetchError>>>,
    threads: Mutex<HashMap<ConversationId, Vec<Message>>>,
    gates: Mutex<HashMap<ConversationId, VecDeque<oneshot::Receiver<Vec<Message>>>>>,
    inbox_gates: Mutex<VecDeque<oneshot::Receiver<Vec<Conversation>>>>,
    pub inbox_calls: AtomicUsize,
    pub thread_calls: AtomicUsize,
}

impl FakeSnapshot {
    pub fn set_inbox(&self, result: Result<Vec<Conversation>, FetchError>) {
        *self.inbox.lock() = Some(result);
    }

    pub fn set_thread(&self, id: &str, messages: Vec<Message>) {
        self.threads.lock().insert(ConversationId::from(id), messages);
    }

    /// The next fetch of `id` waits for the returned sender.
    pub fn hold_thread(&self, id: &str) -> oneshot::Sender<Vec<Message>> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .entry(ConversationId::from(id))
            .or_default()
            .push_back(rx);
        tx
    }

    /// The next inbox fetch waits for the returned sender.
    pub fn hold_inbox(&self) -> oneshot::Sender<Vec<Conversation>> {
        let (tx, rx) = oneshot::channel();
        self.inbox_gates.lock().push_back(rx);
        tx
    }
}

#[async_trait]
impl SnapshotClient for FakeSnapshot {
    async fn fetch_inbox(&self) -> Result<Vec<Conversation>, FetchError> {
        self.inbox_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.inbox_gates.lock().pop_front();
        if let Some(gate) = gate {
            return Ok(gate.await.unwrap_or_default());
        }
        self.inbox.lock().clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_thread(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, FetchError> {
        self.thread_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .gates
            .lock()
            .get_mut(conversation_id)
            .and_then(|queue| queue.pop_front());
        if let Some(gate) = gate {
            return Ok(gate.await.unwrap_or_default());
        }
        Ok(self
            .threads
            .lock()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Transport answering sends from a queue of scripted acks.
pub struct FakeTransport {
    acks: Mutex<VecDeque<Result<MessageEvent, SyncError>>>,
    pub sent: Mutex<Vec<SendMessageRequest>>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent>>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            acks: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }
}

impl FakeTransport {
    pub fn script_ack(&self, ack: Result<MessageEvent, SyncError>) {
        self.acks.lock().push_back(ack);
    }

    pub fn emit(&self, event: ChannelEvent) {
        self.events_tx.send(event).unwrap();
    }
}

#[async_trait]
impl TransportChannel for FakeTransport {
    async fn connect(&self, _session: &Session) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn disconnect(&self) {}

    fn is_connected(&self) -> bool {
        true
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<MessageEvent, SyncError> {
        self.sent.lock().push(request);
        self.acks
            .lock()
            .pop_front()
            .unwrap_or(Err(ChannelError::Disconnected.into()))
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events_rx.lock().take()
    }
}
