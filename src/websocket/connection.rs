//! [`WsConnection`]: the JSON-over-WebSocket [`Connection`].
//!
//! Requests are tagged with a `cm_<n>` client message id and parked in a
//! pending map until the reader task sees the reply with the same id. Push
//! events are fanned out to the listeners registered for their kind. When
//! the socket ends without [`Connection::close`] being called, pending
//! requests fail and listeners receive a client-disconnect event.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use tungstenite::Message as WsMessage;

use super::handler::{self, Frame};
use super::{WsReader, WsWriter, connect};
use crate::Result;
use crate::error::FeedError;
use crate::models::{ClientDisconnectEvent, EventKind, PushEvent, Request};
use crate::upstream::{Connection, ListenerToken, Response};

/// How long a request waits for its reply.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type Pending = HashMap<String, oneshot::Sender<Result<Response>>>;

struct Listener {
    token: ListenerToken,
    kind: EventKind,
    tx: mpsc::UnboundedSender<PushEvent>,
}

/// State shared with the reader task.
#[derive(Default)]
struct Shared {
    pending: Mutex<Pending>,
    listeners: Mutex<Vec<Listener>>,
}

impl Shared {
    fn emit(&self, event: PushEvent) {
        let kind = event.kind();
        self.listeners
            .lock()
            .retain(|l| l.kind != kind || l.tx.send(event.clone()).is_ok());
    }

    fn resolve(&self, client_msg_id: &str, reply: Result<Response>) {
        match self.pending.lock().remove(client_msg_id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!(client_msg_id, "Reply for unknown or expired request"),
        }
    }

    fn fail_pending(&self, reason: &str) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for (_, tx) in pending {
            let _ = tx.send(Err(FeedError::Connection(reason.to_string())));
        }
    }
}

/// Open API connection over a JSON WebSocket.
pub struct WsConnection {
    url: String,
    request_timeout: Duration,
    writer: Arc<tokio::sync::Mutex<Option<WsWriter>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
    next_msg_id: AtomicU64,
    next_listener: AtomicU64,
}

impl WsConnection {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: REQUEST_TIMEOUT,
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            reader: Mutex::new(None),
            shared: Arc::new(Shared::default()),
            next_msg_id: AtomicU64::new(0),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Overrides how long requests wait for their reply.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_client_msg_id(&self) -> String {
        format!("cm_{}", self.next_msg_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let Some(write) = guard.as_mut() else {
            return Err(FeedError::Connection("not connected".into()));
        };
        write.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn open(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        if writer.is_some() {
            debug!(url = %self.url, "Connection already open");
            return Ok(());
        }

        info!(url = %self.url, "Connecting to WebSocket");
        let (write, read) = connect(&self.url).await?;
        *writer = Some(write);

        let handle = tokio::spawn(read_loop(read, self.shared.clone(), self.writer.clone()));
        if let Some(previous) = self.reader.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn send_command(&self, request: Request) -> Result<Response> {
        let client_msg_id = self.next_client_msg_id();
        let text = handler::encode_request(&client_msg_id, &request)?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(client_msg_id.clone(), tx);
        if let Err(e) = self.send_text(text).await {
            self.shared.pending.lock().remove(&client_msg_id);
            return Err(e);
        }
        debug!(request = request.name(), %client_msg_id, "Request sent");

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(FeedError::Connection(
                "connection closed before the reply arrived".into(),
            )),
            Err(_) => {
                self.shared.pending.lock().remove(&client_msg_id);
                warn!(request = request.name(), %client_msg_id, "Request timed out");
                Err(FeedError::Timeout(format!(
                    "{} ({client_msg_id})",
                    request.name()
                )))
            }
        }
    }

    async fn send_heartbeat(&self) -> Result<()> {
        self.send_text(handler::encode_heartbeat()?).await?;
        trace!("Sent heartbeat");
        Ok(())
    }

    fn on(&self, kind: EventKind, listener: mpsc::UnboundedSender<PushEvent>) -> ListenerToken {
        let token = ListenerToken(self.next_listener.fetch_add(1, Ordering::Relaxed) + 1);
        self.shared.listeners.lock().push(Listener {
            token,
            kind,
            tx: listener,
        });
        debug!(kind = kind.as_str(), token = token.0, "Event listener registered");
        token
    }

    fn remove_event_listener(&self, token: ListenerToken) {
        self.shared.listeners.lock().retain(|l| l.token != token);
    }

    async fn close(&self) {
        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            reader.abort();
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut write) = writer {
            if let Err(e) = write.close().await {
                debug!(error = %e, "Error while closing WebSocket");
            }
            info!(url = %self.url, "WebSocket closed");
        }

        self.shared.fail_pending("connection closed");
    }
}

/// Reads frames until the socket ends, dispatching replies and events.
async fn read_loop(
    mut read: WsReader,
    shared: Arc<Shared>,
    writer: Arc<tokio::sync::Mutex<Option<WsWriter>>>,
) {
    let reason = loop {
        match read.next().await {
            Some(Ok(WsMessage::Text(text))) => dispatch(&shared, &text),
            Some(Ok(WsMessage::Close(frame))) => {
                break frame.map_or_else(
                    || "closed by server".to_string(),
                    |f| format!("closed by server: {}", f.reason.as_str()),
                );
            }
            Some(Ok(_)) => {} // Binary/Ping/Pong frames
            Some(Err(e)) => {
                warn!("WebSocket error: {e}");
                break e.to_string();
            }
            None => break "stream ended".to_string(),
        }
    };

    warn!(%reason, "WebSocket connection lost");
    *writer.lock().await = None;
    shared.fail_pending(&reason);
    shared.emit(PushEvent::ClientDisconnect(ClientDisconnectEvent {
        reason: Some(reason),
    }));
}

fn dispatch(shared: &Shared, text: &str) {
    match handler::parse_frame(text) {
        Ok(Frame::Reply {
            client_msg_id,
            reply,
        }) => shared.resolve(&client_msg_id, reply.map_err(FeedError::Upstream)),
        Ok(Frame::Event(event)) => shared.emit(event),
        Ok(Frame::Unhandled {
            payload_type,
            client_msg_id,
        }) => {
            if let Some(id) = client_msg_id {
                // A reply type we do not model still completes its request.
                warn!(payload_type, client_msg_id = %id, "Unrecognized reply payload");
                shared.resolve(
                    &id,
                    Err(FeedError::MalformedMessage(format!(
                        "unexpected payload type {payload_type}"
                    ))),
                );
            } else {
                trace!(payload_type, "Ignoring unhandled frame");
            }
        }
        Err(e) => warn!(error = %e, "Failed to parse frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_msg_ids_are_sequential() {
        let connection = WsConnection::new("wss://demo.ctraderapi.com:5036");
        assert_eq!(connection.next_client_msg_id(), "cm_1");
        assert_eq!(connection.next_client_msg_id(), "cm_2");
    }

    #[test]
    fn emit_reaches_listeners_of_matching_kind() {
        let connection = WsConnection::new("wss://demo.ctraderapi.com:5036");
        let (hb_tx, mut hb_rx) = mpsc::unbounded_channel();
        let (spot_tx, mut spot_rx) = mpsc::unbounded_channel();
        connection.on(EventKind::Heartbeat, hb_tx);
        connection.on(EventKind::Spot, spot_tx);

        connection.shared.emit(PushEvent::Heartbeat);

        assert_eq!(hb_rx.try_recv().unwrap(), PushEvent::Heartbeat);
        assert!(spot_rx.try_recv().is_err());
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let connection = WsConnection::new("wss://demo.ctraderapi.com:5036");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = connection.on(EventKind::Heartbeat, tx);
        connection.remove_event_listener(token);

        connection.shared.emit(PushEvent::Heartbeat);
        // Sender dropped with the listener.
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn dispatch_resolves_pending_requests() {
        let shared = Shared::default();
        let (tx, mut rx) = oneshot::channel();
        shared.pending.lock().insert("cm_1".into(), tx);

        dispatch(
            &shared,
            r#"{"clientMsgId":"cm_1","payloadType":2142,"payload":{"errorCode":"ALREADY_SUBSCRIBED"}}"#,
        );

        let reply = rx.try_recv().unwrap();
        assert!(reply.unwrap_err().is_already_subscribed());
        assert!(shared.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn requests_fail_when_not_connected() {
        let connection = WsConnection::new("wss://demo.ctraderapi.com:5036");
        let err = connection.send_heartbeat().await.unwrap_err();
        assert!(matches!(err, FeedError::Connection(_)));
        assert!(connection.shared.pending.lock().is_empty());
    }
}
