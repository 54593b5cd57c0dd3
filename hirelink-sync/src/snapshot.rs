//! Request/response snapshot fetches for the inbox and a single thread.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{FetchError, FetchErrorKind};
use crate::models::{Conversation, ConversationId, Message};
use crate::session::Session;

/// Header carrying the caller's user id alongside the bearer token.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Body of `GET inbox`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxResponse {
    pub conversations: Vec<Conversation>,
}

/// Body of `GET thread?conversationId=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub messages: Vec<Message>,
}

#[async_trait]
pub trait SnapshotClient: Send + Sync + 'static {
    async fn fetch_inbox(&self) -> Result<Vec<Conversation>, FetchError>;

    /// Messages of one conversation, oldest first.
    async fn fetch_thread(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, FetchError>;
}

/// [`SnapshotClient`] over HTTP.
pub struct HttpSnapshotClient {
    client: reqwest::Client,
    base_url: Url,
    session: Session,
}

impl HttpSnapshotClient {
    pub fn new(config: &SyncConfig, session: Session) -> Result<Self, FetchError> {
        let mut base_url = Url::parse(&config.api_base_url).map_err(|e| {
            FetchError::new(
                FetchErrorKind::Network,
                format!("invalid api base url {}: {}", config.api_base_url, e),
            )
        })?;
        // `Url::join` replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| FetchError::new(FetchErrorKind::Network, e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::new(FetchErrorKind::Network, e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        debug!(%url, "Snapshot request");

        let mut request = self
            .client
            .get(url.clone())
            .query(query)
            .header(USER_ID_HEADER, self.session.user_id.as_str());
        if let Some(token) = &self.session.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Snapshot request failed");
            let kind = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchErrorKind::Unauthorized,
                other => FetchErrorKind::Status(other.as_u16()),
            };
            return Err(FetchError::new(kind, format!("{} returned {}", url, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::new(FetchErrorKind::Decode, e.to_string()))
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    let kind = if error.is_timeout() {
        FetchErrorKind::Timeout
    } else if error.is_decode() {
        FetchErrorKind::Decode
    } else {
        FetchErrorKind::Network
    };
    FetchError::new(kind, error.to_string())
}

#[async_trait]
impl SnapshotClient for HttpSnapshotClient {
    async fn fetch_inbox(&self) -> Result<Vec<Conversation>, FetchError> {
        let url = self.endpoint("inbox")?;
        let body: InboxResponse = self.get_json(url, &[]).await?;
        debug!(count = body.conversations.len(), "Fetched inbox");
        Ok(body.conversations)
    }

    async fn fetch_thread(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, FetchError> {
        let url = self.endpoint("thread")?;
        let body: ThreadResponse = self
            .get_json(url, &[("conversationId", conversation_id.as_str())])
            .await?;
        debug!(%conversation_id, count = body.messages.len(), "Fetched thread");
        Ok(body.messages)
    }
}
