use std::sync::Arc;

use hirelink_relay::{handle_message, ServerState};
use hirelink_sync::{SendMessageRequest, UserId, WsMessage};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn user(id: &str) -> UserId {
    UserId::from(id)
}

#[tokio::test]
async fn test_sender_spoofing_protection() {
    let state = Arc::new(ServerState::default());
    let (victim_tx, mut victim_rx) = mpsc::unbounded_channel();
    state.add_client(user("victim"), victim_tx);
    let (attacker_tx, mut attacker_rx) = mpsc::unbounded_channel();

    // Attacker tries to pass itself off as "admin"
    let spoofed = json!({
        "type": "send_message",
        "requestId": "r1",
        "request": {
            "recipientId": "victim",
            "senderId": "admin",
            "type": "text",
            "content": "Click this link"
        }
    })
    .to_string();

    handle_message(&spoofed, &user("attacker"), &attacker_tx, &state);

    let pushed: WsMessage = serde_json::from_str(&victim_rx.recv().await.unwrap()).unwrap();
    match pushed {
        WsMessage::ReceiveMessage(event) => {
            assert_eq!(event.message.sender_id, user("attacker"));
            assert!(event.conversation.has_participant(&user("attacker")));
            assert!(!event.conversation.has_participant(&user("admin")));
        }
        other => panic!("Expected receive_message, got {:?}", other),
    }

    let ack: WsMessage = serde_json::from_str(&attacker_rx.recv().await.unwrap()).unwrap();
    assert!(matches!(ack, WsMessage::Ack { data: Some(_), .. }));
}

#[tokio::test]
async fn test_send_to_self_rejected() {
    let state = Arc::new(ServerState::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.add_client(user("alice"), tx.clone());

    let frame = serde_json::to_string(&WsMessage::SendMessage {
        request_id: "r2".to_string(),
        request: SendMessageRequest {
            recipient_id: user("alice"),
            payload: hirelink_sync::MessagePayload::text("note to self"),
        },
    })
    .unwrap();
    handle_message(&frame, &user("alice"), &tx, &state);

    let ack: WsMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    match ack {
        WsMessage::Ack {
            request_id,
            data,
            error,
        } => {
            assert_eq!(request_id, "r2");
            assert!(data.is_none());
            assert!(error.is_some());
        }
        other => panic!("Expected ack, got {:?}", other),
    }
    assert!(rx.try_recv().is_err());
    assert!(state.store.inbox_for(&user("alice")).is_empty());
}

#[tokio::test]
async fn test_server_only_frames_are_ignored() {
    let state = Arc::new(ServerState::default());
    let (victim_tx, mut victim_rx) = mpsc::unbounded_channel();
    state.add_client(user("victim"), victim_tx);
    let (tx, mut rx) = mpsc::unbounded_channel();

    // A forged push must not be relayed to anyone
    let forged = json!({
        "type": "receive_message",
        "message": {
            "id": "m1",
            "conversationId": "c1",
            "senderId": "admin",
            "type": "text",
            "content": "forged",
            "createdAt": "2024-05-02T14:00:00Z",
            "updatedAt": "2024-05-02T14:00:00Z"
        },
        "conversation": {
            "id": "c1",
            "participants": [],
            "createdAt": "2024-05-02T14:00:00Z",
            "updatedAt": "2024-05-02T14:00:00Z"
        }
    })
    .to_string();
    handle_message(&forged, &user("attacker"), &tx, &state);

    assert!(victim_rx.try_recv().is_err());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_thread_of_other_users_is_forbidden_over_http() {
    let state = Arc::new(ServerState::new(Some("relay-token".to_string())));
    let event = state
        .store
        .record_message(
            &user("alice"),
            SendMessageRequest {
                recipient_id: user("bob"),
                payload: hirelink_sync::MessagePayload::text("salary details"),
            },
        )
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(hirelink_relay::serve_http(listener, state));

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/thread", port);
    let conversation_id = event.conversation.id.to_string();

    let response = client
        .get(&url)
        .query(&[("conversationId", conversation_id.as_str())])
        .header("x-user-id", "mallory")
        .bearer_auth("relay-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);

    let response = client
        .get(&url)
        .query(&[("conversationId", conversation_id.as_str())])
        .header("x-user-id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    server.abort();
}
