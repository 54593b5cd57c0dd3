use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hirelink_sync::snapshot::USER_ID_HEADER;
use hirelink_sync::{ConversationId, InboxResponse, ThreadResponse, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::ServerState;
use crate::store::StoreError;

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/inbox", get(get_inbox))
        .route("/thread", get(get_thread))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden(String),
    NotFound(String),
}

#[derive(Debug, Serialize)]
struct ApiErrorBody<'a> {
    error: &'a str,
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg)),
        };
        (status, Json(ApiErrorBody { error, message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Forbidden(_) | StoreError::SelfMessage => {
                ApiError::Forbidden(err.to_string())
            }
        }
    }
}

/// Authenticated caller: the `x-user-id` header, plus the bearer token when
/// the relay is configured with one.
#[derive(Clone, Debug)]
pub struct Caller(pub UserId);

#[async_trait]
impl FromRequestParts<Arc<ServerState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = header_str(&parts.headers, USER_ID_HEADER)
            .filter(|id| !id.trim().is_empty())
            .ok_or(ApiError::Unauthorized)?;
        let token = header_str(&parts.headers, axum::http::header::AUTHORIZATION.as_str())
            .and_then(|auth| auth.strip_prefix("Bearer "));
        if !state.token_allowed(token) {
            return Err(ApiError::Unauthorized);
        }
        Ok(Caller(UserId::from(user_id)))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn get_inbox(
    State(state): State<Arc<ServerState>>,
    Caller(user_id): Caller,
) -> Json<InboxResponse> {
    let conversations = state.store.inbox_for(&user_id);
    debug!(user_id = %user_id, count = conversations.len(), "Inbox served");
    Json(InboxResponse { conversations })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadQuery {
    conversation_id: ConversationId,
}

async fn get_thread(
    State(state): State<Arc<ServerState>>,
    Caller(user_id): Caller,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let messages = state.store.thread_for(&user_id, &query.conversation_id)?;
    Ok(Json(ThreadResponse { messages }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{self, Body};
    use axum::http::Request;
    use hirelink_sync::{MessagePayload, SendMessageRequest};
    use tower::util::ServiceExt;

    fn seeded() -> (Arc<ServerState>, ConversationId) {
        let state = Arc::new(ServerState::new(Some("test-token".to_string())));
        let event = state
            .store
            .record_message(
                &UserId::from("alice"),
                SendMessageRequest {
                    recipient_id: UserId::from("bob"),
                    payload: MessagePayload::text("Is the forklift role still open?"),
                },
            )
            .unwrap();
        (state, event.conversation.id)
    }

    fn get(uri: &str, user: Option<&str>, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_inbox_for_caller() {
        let (state, id) = seeded();
        let app = build_router(state);

        let response = app
            .oneshot(get("/inbox", Some("bob"), Some("test-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let inbox: InboxResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(inbox.conversations.len(), 1);
        assert_eq!(inbox.conversations[0].id, id);
    }

    #[tokio::test]
    async fn test_missing_identity_or_token_is_unauthorized() {
        let (state, _) = seeded();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(get("/inbox", None, Some("test-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(get("/inbox", Some("bob"), Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_thread_access_rules() {
        let (state, id) = seeded();
        let app = build_router(state);
        let uri = format!("/thread?conversationId={}", id);

        let response = app
            .clone()
            .oneshot(get(&uri, Some("alice"), Some("test-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let thread: ThreadResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(thread.messages.len(), 1);

        let response = app
            .clone()
            .oneshot(get(&uri, Some("mallory"), Some("test-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(get(
                "/thread?conversationId=missing",
                Some("alice"),
                Some("test-token"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
