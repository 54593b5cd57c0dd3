use dashmap::DashMap;
use hirelink_sync::UserId;
use tokio::sync::mpsc;

use crate::store::ConversationStore;

/// Connected clients plus the conversation store
pub struct ServerState {
    /// user_id -> list of sender channels (one per open connection)
    pub clients: DashMap<UserId, Vec<mpsc::UnboundedSender<String>>>,
    pub store: ConversationStore,
    /// Shared secret required at handshake and on HTTP requests when set
    access_token: Option<String>,
}

impl ServerState {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            clients: DashMap::new(),
            store: ConversationStore::new(),
            access_token: access_token.filter(|t| !t.is_empty()),
        }
    }

    /// Whether `token` satisfies the configured access token.
    pub fn token_allowed(&self, token: Option<&str>) -> bool {
        match &self.access_token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }

    /// Register a new client connection (supports multiple connections per user)
    pub fn add_client(&self, user_id: UserId, tx: mpsc::UnboundedSender<String>) {
        self.clients.entry(user_id).or_default().push(tx);
    }

    /// Drop closed channels of `user_id`, and the user once none remain
    pub fn remove_client(&self, user_id: &UserId) {
        if let Some(mut entry) = self.clients.get_mut(user_id) {
            entry.retain(|tx| !tx.is_closed());
            if entry.is_empty() {
                drop(entry);
                self.clients.remove(user_id);
            }
        }
    }

    /// Send a frame to every connection of `user_id`
    pub fn send_to_user(&self, user_id: &UserId, frame: &str) -> bool {
        let Some(channels) = self.clients.get(user_id) else {
            return false;
        };
        let mut sent = false;
        for tx in channels.iter() {
            if tx.send(frame.to_string()).is_ok() {
                sent = true;
            }
        }
        sent
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.clients
            .get(user_id)
            .map(|channels| !channels.is_empty())
            .unwrap_or(false)
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(None)
    }
}
