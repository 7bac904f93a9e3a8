//! Contract of the connection this crate drives.
//!
//! The aggregation and supervision logic never touches sockets or frames;
//! it talks to a [`Connection`]. [`crate::websocket::WsConnection`] is the
//! bundled implementation, tests use scripted ones.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::models::{EventKind, PayloadType, PushEvent, Request};

/// Handle identifying a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(pub u64);

/// Successful response to a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub payload_type: PayloadType,
    pub payload: serde_json::Value,
}

/// A request/response connection with server push events.
///
/// A connection may be opened again after [`Connection::close`]. Listeners
/// receive events through channels rather than callbacks so the consumer
/// decides on which task events are processed.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Opens the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Connection`](crate::FeedError::Connection) or a
    /// transport error if the connection cannot be established.
    async fn open(&self) -> Result<()>;

    /// Sends `request` and waits for its correlated response.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Upstream`](crate::FeedError::Upstream) when the
    /// server answers with an error payload, or a transport/timeout error.
    async fn send_command(&self, request: Request) -> Result<Response>;

    /// Sends a heartbeat to the server.
    async fn send_heartbeat(&self) -> Result<()>;

    /// Forwards every push event of `kind` to `listener`.
    fn on(&self, kind: EventKind, listener: mpsc::UnboundedSender<PushEvent>) -> ListenerToken;

    /// Stops forwarding to the listener registered under `token`.
    fn remove_event_listener(&self, token: ListenerToken);

    /// Closes the transport. Pending requests fail.
    async fn close(&self);
}
