use super::messages::{ack_outcome, MessageEvent, WsMessage};
use crate::config::SyncConfig;
use crate::error::{AckError, ChannelError, SyncError};
use crate::models::input::SendMessageRequest;
use crate::session::Session;
use crate::transport::{ChannelEvent, TransportChannel};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;
type AckSender = oneshot::Sender<Result<MessageEvent, AckError>>;

const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Internal message type for the write channel
enum WriteMessage {
    Data(String),
    Close,
}

/// State shared between the public handle and the connection task.
struct Inner {
    server_url: String,
    ack_timeout: Duration,
    reconnect_delay: Duration,
    write_tx: Mutex<Option<mpsc::UnboundedSender<WriteMessage>>>,
    /// request_id -> waiting `send_message` call
    pending: Mutex<HashMap<String, AckSender>>,
    connected: AtomicBool,
    /// Set by the first successful handshake; later ones report `Reconnected`.
    ever_connected: AtomicBool,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl Inner {
    fn emit(&self, event: ChannelEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("Push receiver dropped, event discarded");
        }
    }

    /// Drop every waiting ack sender so callers observe a disconnect.
    fn fail_pending(&self) {
        let dropped = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if dropped > 0 {
            warn!(count = dropped, "Connection lost with sends awaiting acknowledgment");
        }
    }

    fn resolve_ack(&self, request_id: &str, outcome: Result<MessageEvent, AckError>) {
        let waiter = self.pending.lock().remove(request_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => debug!(request_id, "Acknowledgment for unknown or expired request"),
        }
    }
}

/// WebSocket transport to the HireLink server with automatic reconnection.
pub struct WsTransport {
    inner: Arc<Inner>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent>>>,
    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(config: &SyncConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(url = %config.ws_url, "Using WebSocket server URL");

        Self {
            inner: Arc::new(Inner {
                server_url: config.ws_url.clone(),
                ack_timeout: config.ack_timeout,
                reconnect_delay: config.reconnect_delay,
                write_tx: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                connected: AtomicBool::new(false),
                ever_connected: AtomicBool::new(false),
                events_tx,
            }),
            events_rx: Mutex::new(Some(events_rx)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.inner.server_url
    }

    fn write(&self, message: WriteMessage) -> Result<(), ChannelError> {
        let guard = self.inner.write_tx.lock();
        match guard.as_ref() {
            Some(tx) => tx.send(message).map_err(|_| ChannelError::NotConnected),
            None => Err(ChannelError::NotConnected),
        }
    }
}

#[async_trait]
impl TransportChannel for WsTransport {
    /// Connect and authenticate. Resolves once the first handshake finishes;
    /// later drops are retried in the background.
    async fn connect(&self, session: &Session) -> Result<(), ChannelError> {
        {
            let task = self.task.lock();
            if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
                debug!("Connection task already running");
                return Ok(());
            }
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(run_connection(
            self.inner.clone(),
            session.clone(),
            ready_tx,
            self.shutdown_tx.subscribe(),
        ));
        *self.task.lock() = Some(handle);

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Disconnected),
        }
    }

    /// Gracefully disconnect and stop reconnecting.
    async fn disconnect(&self) {
        info!("Initiating graceful disconnect");
        let _ = self.shutdown_tx.send(());
        let _ = self.write(WriteMessage::Close);

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(DISCONNECT_GRACE, handle).await.is_err() {
                warn!("Connection task did not stop in time");
            }
        }
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<MessageEvent, SyncError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected.into());
        }

        let request_id = Uuid::new_v4().to_string();
        let frame = WsMessage::SendMessage {
            request_id: request_id.clone(),
            request,
        };
        let json = serde_json::to_string(&frame)
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(request_id.clone(), tx);

        debug!(request_id = %request_id, "Sending message to server");
        if let Err(e) = self.write(WriteMessage::Data(json)) {
            self.inner.pending.lock().remove(&request_id);
            warn!("Cannot send message: not connected to server");
            return Err(e.into());
        }

        match tokio::time::timeout(self.inner.ack_timeout, rx).await {
            Ok(Ok(outcome)) => outcome.map_err(SyncError::from),
            Ok(Err(_)) => Err(ChannelError::Disconnected.into()),
            Err(_) => {
                self.inner.pending.lock().remove(&request_id);
                warn!(request_id = %request_id, "Acknowledgment timed out");
                Err(AckError::Timeout(self.inner.ack_timeout).into())
            }
        }
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events_rx.lock().take()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Connect, authenticate and pump frames until shutdown, reconnecting after
/// unexpected drops. The first handshake result is reported on `ready`.
async fn run_connection(
    inner: Arc<Inner>,
    session: Session,
    ready: oneshot::Sender<Result<(), ChannelError>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ready = Some(ready);

    loop {
        // Check for shutdown before attempting connection
        if shutdown_rx.try_recv().is_ok() {
            info!("Shutdown signal received, stopping reconnection");
            break;
        }

        info!(url = %inner.server_url, "Connecting to HireLink server");

        match handshake(&inner, &session).await {
            Ok((ws_write, ws_read)) => {
                let (write_tx, write_rx) = mpsc::unbounded_channel::<WriteMessage>();
                *inner.write_tx.lock() = Some(write_tx);
                inner.connected.store(true, Ordering::SeqCst);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
                inner.emit(if inner.ever_connected.swap(true, Ordering::SeqCst) {
                    ChannelEvent::Reconnected
                } else {
                    ChannelEvent::Connected
                });

                let should_reconnect =
                    pump(&inner, ws_write, ws_read, write_rx, &mut shutdown_rx).await;

                // Cleanup
                *inner.write_tx.lock() = None;
                inner.connected.store(false, Ordering::SeqCst);
                inner.fail_pending();
                inner.emit(ChannelEvent::Disconnected);
                info!("Disconnected from HireLink server");

                if !should_reconnect {
                    break;
                }
            }
            Err(e) => {
                if let Some(tx) = ready.take() {
                    error!(error = %e, "Initial connection failed");
                    let _ = tx.send(Err(e));
                    return;
                }
                if let ChannelError::AuthFailed(_) = e {
                    error!(error = %e, "Authentication rejected, giving up");
                    inner.emit(ChannelEvent::Disconnected);
                    break;
                }
                error!(error = %e, url = %inner.server_url, "Failed to reconnect");
            }
        }

        // Reconnect after delay
        debug!(delay_ms = inner.reconnect_delay.as_millis() as u64, "Reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(inner.reconnect_delay) => {}
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping reconnection");
                break;
            }
        }
    }
}

/// Open the socket and run the `connect` -> `auth_response` exchange.
async fn handshake(inner: &Inner, session: &Session) -> Result<(WsWrite, WsRead), ChannelError> {
    let (ws_stream, _) = connect_async(inner.server_url.as_str())
        .await
        .map_err(|_| ChannelError::NotConnected)?;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let connect_msg = WsMessage::Connect {
        user_id: session.user_id.clone(),
        token: session.token.clone(),
        profile: session.profile.clone(),
    };
    let connect_json =
        serde_json::to_string(&connect_msg).map_err(|e| ChannelError::Protocol(e.to_string()))?;
    ws_write
        .send(Message::Text(connect_json.into()))
        .await
        .map_err(|_| ChannelError::NotConnected)?;

    let response = tokio::time::timeout(inner.ack_timeout, ws_read.next())
        .await
        .map_err(|_| ChannelError::Protocol("timed out waiting for auth response".to_string()))?;

    match response {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsMessage>(&text) {
            Ok(WsMessage::AuthResponse { success: true, message }) => {
                info!(user_id = %session.user_id, "Authenticated with server: {}", message);
                Ok((ws_write, ws_read))
            }
            Ok(WsMessage::AuthResponse { success: false, message }) => {
                Err(ChannelError::AuthFailed(message))
            }
            Ok(_) => Err(ChannelError::Protocol(
                "unexpected frame during auth".to_string(),
            )),
            Err(e) => Err(ChannelError::Protocol(e.to_string())),
        },
        Some(Ok(_)) => Err(ChannelError::Protocol(
            "expected text auth response".to_string(),
        )),
        Some(Err(_)) | None => Err(ChannelError::Disconnected),
    }
}

/// Message loop for one established connection.
/// Returns whether the caller should reconnect.
async fn pump(
    inner: &Inner,
    mut ws_write: WsWrite,
    mut ws_read: WsRead,
    mut rx: mpsc::UnboundedReceiver<WriteMessage>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> bool {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing connection gracefully");
                if let Err(e) = ws_write.send(Message::Close(None)).await {
                    warn!(error = %e, "Failed to send close frame");
                }
                return false;
            }
            Some(msg) = rx.recv() => {
                match msg {
                    WriteMessage::Data(data) => {
                        if ws_write.send(Message::Text(data.into())).await.is_err() {
                            error!("Failed to send message to server");
                            return true;
                        }
                    }
                    WriteMessage::Close => {
                        info!("Close requested, sending close frame");
                        if let Err(e) = ws_write.send(Message::Close(None)).await {
                            warn!(error = %e, "Failed to send close frame");
                        }
                        return false;
                    }
                }
            }
            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_frame(inner, &text),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed connection");
                        return true;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        return true;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Route one inbound text frame to a waiting ack or to the push receiver.
fn handle_frame(inner: &Inner, text: &str) {
    let frame = match serde_json::from_str::<WsMessage>(text) {
        Ok(frame) => frame,
        Err(e) => {
            let preview: String = text.chars().take(100).collect();
            warn!(error = %e, %preview, "Unparseable frame from server");
            return;
        }
    };

    match frame {
        WsMessage::Ack {
            request_id,
            data,
            error,
        } => inner.resolve_ack(&request_id, ack_outcome(data, error)),
        WsMessage::ReceiveMessage(event) => {
            debug!(
                message_id = %event.message.id,
                conversation_id = %event.conversation.id,
                "Push received"
            );
            inner.emit(ChannelEvent::Push(event));
        }
        WsMessage::Error { message } => warn!(%message, "Server reported error"),
        other => debug!(?other, "Ignoring unexpected frame"),
    }
}
