//! Sync coordinator: the only writer of the inbox and thread caches.
//!
//! Three asynchronous sources feed it: snapshot responses, push events from
//! the transport, and acknowledgments of the local user's sends. Every
//! mutation takes the state lock once, runs a reducer from [`crate::cache`]
//! and releases the lock before any await, so observers never see the inbox
//! and thread disagree about an applied message.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStatus, EventOutcome, SnapshotApply, SyncState};
use crate::config::SyncConfig;
use crate::error::{ChannelError, SyncError};
use crate::models::input::{SendMessageRequest, ValidateExt};
use crate::models::{Conversation, ConversationId, Message, MessagePayload, UserId};
use crate::session::Session;
use crate::snapshot::SnapshotClient;
use crate::transport::{ChannelEvent, TransportChannel};
use crate::websocket::MessageEvent;

/// Change notifications for read-side collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotification {
    InboxChanged,
    ThreadChanged(ConversationId),
    ActiveChanged(Option<ConversationId>),
    InboxStatus(CacheStatus),
    ThreadStatus(CacheStatus),
    Connection(ConnectionState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnected,
    Disconnected,
}

/// Result of a thread load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadLoad {
    Applied,
    /// The active conversation changed, or a newer load of it was issued,
    /// while the fetch was in flight.
    Discarded,
    /// `select_conversation` was called for the already active conversation.
    AlreadyActive,
}

impl From<SnapshotApply> for ThreadLoad {
    fn from(apply: SnapshotApply) -> Self {
        match apply {
            SnapshotApply::Applied => Self::Applied,
            SnapshotApply::Discarded => Self::Discarded,
        }
    }
}

pub struct SyncCoordinator<T, S> {
    transport: Arc<T>,
    snapshot: Arc<S>,
    session: Session,
    resync_on_reconnect: bool,
    state: Mutex<SyncState>,
    notifier: broadcast::Sender<SyncNotification>,
}

impl<T, S> SyncCoordinator<T, S>
where
    T: TransportChannel,
    S: SnapshotClient,
{
    pub fn new(transport: Arc<T>, snapshot: Arc<S>, session: Session, config: &SyncConfig) -> Self {
        let (notifier, _) = broadcast::channel(config.notify_capacity.max(1));
        Self {
            transport,
            snapshot,
            session,
            resync_on_reconnect: config.resync_on_reconnect,
            state: Mutex::new(SyncState::new()),
            notifier,
        }
    }

    pub fn current_user(&self) -> &UserId {
        &self.session.user_id
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.notifier.subscribe()
    }

    /// Inbox entries in last-written order.
    pub fn inbox(&self) -> Vec<Conversation> {
        self.state.lock().inbox().entries().to_vec()
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.state.lock().inbox().get(id).cloned()
    }

    pub fn thread(&self) -> Vec<Message> {
        self.state.lock().thread().messages().to_vec()
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.state.lock().active().cloned()
    }

    pub fn inbox_status(&self) -> CacheStatus {
        self.state.lock().inbox_status()
    }

    pub fn thread_status(&self) -> CacheStatus {
        self.state.lock().thread_status()
    }

    fn notify(&self, notification: SyncNotification) {
        // No receivers is fine
        let _ = self.notifier.send(notification);
    }

    // ------------------------------------------------------------------
    // Snapshot loads
    // ------------------------------------------------------------------

    /// Fetch the conversation list and replace the inbox wholesale.
    ///
    /// When another inbox load was issued meanwhile, this response is
    /// discarded and the newer one decides the inbox content.
    pub async fn load_inbox(&self) -> Result<(), SyncError> {
        let ticket = self.state.lock().begin_inbox_load();
        self.notify(SyncNotification::InboxStatus(CacheStatus::Loading));

        match self.snapshot.fetch_inbox().await {
            Ok(conversations) => {
                let count = conversations.len();
                let applied = self.state.lock().apply_inbox_snapshot(&ticket, conversations);
                if applied == SnapshotApply::Discarded {
                    debug!(seq = ticket.seq, "Discarding superseded inbox response");
                    return Ok(());
                }
                info!(count, "Inbox loaded");
                self.notify(SyncNotification::InboxChanged);
                self.notify(SyncNotification::InboxStatus(CacheStatus::Ready));
                Ok(())
            }
            Err(e) => {
                let err = SyncError::from(e);
                let status = CacheStatus::Failed(err.kind());
                let applied = self.state.lock().fail_inbox_load(&ticket, err.kind());
                warn!(error = %err, "Inbox load failed");
                if applied == SnapshotApply::Applied {
                    self.notify(SyncNotification::InboxStatus(status));
                }
                Err(err)
            }
        }
    }

    /// Make `id` the active conversation, clear the thread and load it.
    pub async fn select_conversation(&self, id: ConversationId) -> Result<ThreadLoad, SyncError> {
        let ticket = self.state.lock().select(id.clone());
        let Some(ticket) = ticket else {
            debug!(conversation_id = %id, "Conversation already active");
            return Ok(ThreadLoad::AlreadyActive);
        };

        info!(conversation_id = %id, generation = ticket.generation, "Conversation selected");
        self.notify(SyncNotification::ActiveChanged(Some(id.clone())));
        self.notify(SyncNotification::ThreadChanged(id));
        self.notify(SyncNotification::ThreadStatus(CacheStatus::Loading));

        self.fetch_thread(ticket).await
    }

    /// Clear the active pointer; any in-flight thread fetch is discarded.
    pub fn close_conversation(&self) {
        if self.state.lock().deselect() {
            self.notify(SyncNotification::ActiveChanged(None));
            self.notify(SyncNotification::ThreadStatus(CacheStatus::Empty));
        }
    }

    /// Fetch messages of `id`; applied only if `id` is still the active
    /// conversation and no newer selection or load of it was issued.
    pub async fn load_thread(&self, id: ConversationId) -> Result<ThreadLoad, SyncError> {
        let ticket = self.state.lock().begin_thread_load(id);
        self.fetch_thread(ticket).await
    }

    async fn fetch_thread(
        &self,
        ticket: crate::cache::ThreadTicket,
    ) -> Result<ThreadLoad, SyncError> {
        let result = self.snapshot.fetch_thread(&ticket.conversation_id).await;

        match result {
            Ok(messages) => {
                let count = messages.len();
                let applied = self.state.lock().apply_thread_snapshot(&ticket, messages);
                match applied {
                    SnapshotApply::Applied => {
                        debug!(conversation_id = %ticket.conversation_id, count, "Thread loaded");
                        self.notify(SyncNotification::ThreadChanged(ticket.conversation_id));
                        self.notify(SyncNotification::ThreadStatus(CacheStatus::Ready));
                    }
                    SnapshotApply::Discarded => {
                        debug!(
                            conversation_id = %ticket.conversation_id,
                            "Discarding thread response for inactive conversation"
                        );
                    }
                }
                Ok(applied.into())
            }
            Err(e) => {
                let err = SyncError::from(e);
                let applied = self.state.lock().fail_thread_load(&ticket, err.kind());
                warn!(conversation_id = %ticket.conversation_id, error = %err, "Thread load failed");
                if applied == SnapshotApply::Applied {
                    self.notify(SyncNotification::ThreadStatus(CacheStatus::Failed(err.kind())));
                }
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Sends and pushes
    // ------------------------------------------------------------------

    /// Send `payload` to the counterpart of the active conversation.
    ///
    /// Nothing is inserted before the server acknowledges; on ack the
    /// conversation summary is upserted and the message is appended if its
    /// conversation is still active.
    pub async fn send(&self, payload: MessagePayload) -> Result<Message, SyncError> {
        let recipient = {
            let state = self.state.lock();
            let active = state.active().ok_or(SyncError::NoActiveConversation)?;
            state
                .inbox()
                .get(active)
                .and_then(|c| c.counterpart(&self.session.user_id))
                .map(|p| p.id.clone())
                .ok_or_else(|| SyncError::NoRecipient(active.clone()))?
        };

        self.send_to(recipient, payload).await
    }

    /// Send `payload` to `recipient`, creating the conversation server-side
    /// if none exists yet.
    pub async fn send_to(
        &self,
        recipient: UserId,
        payload: MessagePayload,
    ) -> Result<Message, SyncError> {
        let request = SendMessageRequest {
            recipient_id: recipient,
            payload,
        };
        request.validate_input()?;

        let recipient = request.recipient_id.clone();
        match self.transport.send_message(request).await {
            Ok(event) => {
                let message = event.message.clone();
                let outcome = self.apply_event(event);
                info!(
                    message_id = %message.id,
                    conversation_id = %message.conversation_id,
                    appended = outcome.thread_appended,
                    "Send acknowledged"
                );
                Ok(message)
            }
            Err(e) => {
                warn!(recipient_id = %recipient, error = %e, "Send failed");
                Err(e)
            }
        }
    }

    /// Apply a `receive_message` push.
    pub fn on_push_message(&self, event: MessageEvent) -> EventOutcome {
        debug!(
            message_id = %event.message.id,
            conversation_id = %event.conversation.id,
            "Applying push"
        );
        self.apply_event(event)
    }

    fn apply_event(&self, event: MessageEvent) -> EventOutcome {
        let conversation_id = event.message.conversation_id.clone();
        let outcome = self.state.lock().apply_message_event(event);

        self.notify(SyncNotification::InboxChanged);
        if outcome.thread_appended {
            self.notify(SyncNotification::ThreadChanged(conversation_id));
        }
        outcome
    }

    /// Reload the inbox and the active thread.
    pub async fn resync(&self) -> Result<(), SyncError> {
        self.load_inbox().await?;
        if let Some(active) = self.active_conversation() {
            self.load_thread(active).await?;
        }
        Ok(())
    }
}

impl<T, S> SyncCoordinator<T, S>
where
    T: TransportChannel,
    S: SnapshotClient,
{
    /// Take the transport's push receiver and spawn the listener task.
    pub fn attach(self: &Arc<Self>) -> Result<JoinHandle<()>, ChannelError> {
        let events = self
            .transport
            .take_events()
            .ok_or(ChannelError::AlreadySubscribed)?;
        Ok(tokio::spawn(self.clone().listen(events)))
    }

    async fn listen(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Push(event) => {
                    self.on_push_message(event);
                }
                ChannelEvent::Connected => {
                    self.notify(SyncNotification::Connection(ConnectionState::Connected));
                }
                ChannelEvent::Reconnected => {
                    self.notify(SyncNotification::Connection(ConnectionState::Reconnected));
                    if self.resync_on_reconnect {
                        info!("Transport reconnected, resyncing");
                        let this = self.clone();
                        // Runs beside the loop so pushes keep flowing
                        tokio::spawn(async move {
                            if let Err(e) = this.resync().await {
                                warn!(error = %e, "Resync after reconnect failed");
                            }
                        });
                    }
                }
                ChannelEvent::Disconnected => {
                    warn!("Transport disconnected");
                    self.notify(SyncNotification::Connection(ConnectionState::Disconnected));
                }
            }
        }
        debug!("Push listener stopped");
    }
}
