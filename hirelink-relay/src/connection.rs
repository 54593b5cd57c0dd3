use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use hirelink_sync::{Participant, UserId, ValidateExt, WsMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::state::ServerState;

/// Time a new connection gets to send its `connect` frame
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn encode(frame: &WsMessage) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize frame: {}", e);
            None
        }
    }
}

fn reply(tx: &mpsc::UnboundedSender<String>, frame: &WsMessage) {
    if let Some(json) = encode(frame) {
        let _ = tx.send(json);
    }
}

/// Handle a single WebSocket connection
pub async fn handle_connection(ws_stream: WebSocketStream<TcpStream>, state: Arc<ServerState>) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let user_id = match wait_for_connect(&mut ws_receiver, &state).await {
        Ok(id) => id,
        Err(reason) => {
            warn!("Connection rejected: {}", reason);
            let response = WsMessage::AuthResponse {
                success: false,
                message: reason,
            };
            if let Some(json) = encode(&response) {
                let _ = ws_sender.send(Message::Text(json)).await;
            }
            let _ = ws_sender.close().await;
            return;
        }
    };

    info!(user_id = %user_id, "User connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.add_client(user_id.clone(), tx.clone());

    let auth_response = WsMessage::AuthResponse {
        success: true,
        message: "Connected to server".to_string(),
    };
    if let Some(json) = encode(&auth_response) {
        if let Err(e) = ws_sender.send(Message::Text(json)).await {
            error!("Failed to send auth response to {}: {}", user_id, e);
        }
    }

    // Forward frames from the channel to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            res = ws_receiver.next() => {
                match res {
                    Some(Ok(Message::Text(text))) => {
                        handle_message(&text, &user_id, &tx, &state);
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("User {} sent close frame", user_id);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for user {}: {}", user_id, e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended for user {}", user_id);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut send_task => {
                info!("Send task finished for user {} (likely connection lost)", user_id);
                break;
            }
        }
    }

    send_task.abort();
    drop(tx);
    state.remove_client(&user_id);

    info!(user_id = %user_id, "User disconnected");
}

/// Wait for the `connect` frame, check its token and register the profile
/// it carries under the authenticated id
async fn wait_for_connect(
    receiver: &mut SplitStream<WebSocketStream<TcpStream>>,
    state: &ServerState,
) -> Result<UserId, String> {
    let handshake = async {
        while let Some(result) = receiver.next().await {
            let text = match result {
                Ok(Message::Text(text)) => text,
                Ok(_) => continue,
                Err(e) => return Err(format!("read error during handshake: {}", e)),
            };
            match serde_json::from_str::<WsMessage>(&text) {
                Ok(WsMessage::Connect {
                    user_id,
                    token,
                    profile,
                }) => {
                    if user_id.as_str().trim().is_empty() {
                        return Err("user id must not be empty".to_string());
                    }
                    if !state.token_allowed(token.as_deref()) {
                        return Err(format!("invalid access token for {}", user_id));
                    }
                    if let Some(profile) = profile {
                        debug!(user_id = %user_id, role = ?profile.role, "Registering profile");
                        state
                            .store
                            .register_profile(Participant::from_profile(user_id.clone(), profile));
                    }
                    return Ok(user_id);
                }
                Ok(other) => {
                    debug!("Ignoring frame before connect: {:?}", other);
                }
                Err(e) => {
                    warn!("Failed to parse Connect message: {}", e);
                }
            }
        }
        Err("connection closed before authentication".to_string())
    };

    match tokio::time::timeout(CONNECT_TIMEOUT, handshake).await {
        Ok(result) => result,
        Err(_) => Err("authentication timeout".to_string()),
    }
}

/// Handle a frame from an authenticated connection.
///
/// `reply_tx` reaches the sending connection only; acks go there while the
/// `receive_message` push goes to every connection of the recipient.
pub fn handle_message(
    text: &str,
    sender_id: &UserId,
    reply_tx: &mpsc::UnboundedSender<String>,
    state: &ServerState,
) {
    let msg: WsMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message from {}: {}", sender_id, e);
            reply(
                reply_tx,
                &WsMessage::Error {
                    message: format!("unreadable frame: {}", e),
                },
            );
            return;
        }
    };

    match msg {
        WsMessage::SendMessage {
            request_id,
            request,
        } => {
            if let Err(e) = request.validate_input() {
                warn!(sender_id = %sender_id, request_id = %request_id, "Rejected message: {}", e);
                reply(reply_tx, &WsMessage::ack_err(request_id, e.to_string()));
                return;
            }

            // The store stamps the authenticated sender, never a client-supplied one
            let recipient_id = request.recipient_id.clone();
            match state.store.record_message(sender_id, request) {
                Ok(event) => {
                    debug!(
                        sender_id = %sender_id,
                        recipient_id = %recipient_id,
                        message_id = %event.message.id,
                        "Message stored"
                    );
                    let push = WsMessage::ReceiveMessage(event.clone());
                    reply(reply_tx, &WsMessage::ack_ok(request_id, event));
                    if !state.is_online(&recipient_id) {
                        debug!("Recipient {} offline, message stored only", recipient_id);
                    } else if let Some(json) = encode(&push) {
                        state.send_to_user(&recipient_id, &json);
                    }
                }
                Err(e) => {
                    warn!(sender_id = %sender_id, request_id = %request_id, "Rejected message: {}", e);
                    reply(reply_tx, &WsMessage::ack_err(request_id, e.to_string()));
                }
            }
        }
        WsMessage::Connect { .. } => {
            // Already authenticated, ignore
        }
        WsMessage::AuthResponse { .. }
        | WsMessage::Ack { .. }
        | WsMessage::ReceiveMessage(_)
        | WsMessage::Error { .. } => {
            // Server-only frames, ignore from client
            debug!("Ignoring server-only frame from {}", sender_id);
        }
    }
}
