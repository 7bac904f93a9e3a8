//! Shared test utilities: a scripted connection and event builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use ctrader_feed::credentials::Credentials;
use ctrader_feed::models::{
    ClientDisconnectEvent, ErrorResponse, EventKind, PayloadType, PushEvent, Request, SpotEvent,
    Trendbar, TrendbarPeriod,
};
use ctrader_feed::supervisor::SupervisorConfig;
use ctrader_feed::upstream::{Connection, ListenerToken, Response};
use ctrader_feed::{FeedError, Result};

pub const ACCOUNT_ID: i64 = 42;

pub fn credentials() -> Credentials {
    Credentials::new("client-id", "client-secret", "access-token", ACCOUNT_ID)
}

pub fn supervisor_config(auto_reconnect: bool) -> SupervisorConfig {
    SupervisorConfig {
        auto_reconnect,
        debug: true,
        ..SupervisorConfig::default()
    }
}

/// Spot event with both sides set to `price` (wire units).
pub fn spot(symbol_id: i64, timestamp: i64, price: i64) -> SpotEvent {
    SpotEvent {
        ctid_trader_account_id: ACCOUNT_ID,
        symbol_id,
        bid: Some(price),
        ask: Some(price),
        timestamp: Some(timestamp),
        ..SpotEvent::default()
    }
}

/// Server fragment for the M1 bar starting at `minutes`.
pub fn m1_fragment(minutes: i64, low: i64, delta_high: i64, volume: i64) -> Trendbar {
    Trendbar {
        volume,
        period: Some(TrendbarPeriod::M1),
        low: Some(low),
        delta_open: Some(0),
        delta_close: None,
        delta_high: Some(delta_high),
        utc_timestamp_in_minutes: Some(minutes),
    }
}

pub fn client_disconnect(reason: &str) -> PushEvent {
    PushEvent::ClientDisconnect(ClientDisconnectEvent {
        reason: Some(reason.to_string()),
    })
}

/// Lets spawned tasks drain their channels.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

struct Listener {
    token: ListenerToken,
    kind: EventKind,
    tx: mpsc::UnboundedSender<PushEvent>,
}

/// In-memory [`Connection`] that records traffic and replays scripted
/// failures.
#[derive(Default)]
pub struct MockConnection {
    requests: Mutex<Vec<Request>>,
    /// Request name to the error code it is answered with.
    failures: Mutex<HashMap<&'static str, String>>,
    /// Request name to the payload it is answered with.
    replies: Mutex<HashMap<&'static str, serde_json::Value>>,
    failing_opens: AtomicUsize,
    listeners: Mutex<Vec<Listener>>,
    next_token: AtomicU64,
    opens: AtomicUsize,
    closes: AtomicUsize,
    heartbeats: AtomicUsize,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request named `request` with `error_code` until
    /// [`Self::succeed`] is called.
    pub fn fail(&self, request: &'static str, error_code: &str) {
        self.failures.lock().insert(request, error_code.to_string());
    }

    pub fn succeed(&self, request: &'static str) {
        self.failures.lock().remove(request);
    }

    /// Answers every successful request named `request` with `payload`.
    pub fn reply(&self, request: &'static str, payload: serde_json::Value) {
        self.replies.lock().insert(request, payload);
    }

    /// Makes the next `count` calls to `open` fail.
    pub fn fail_opens(&self, count: usize) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Delivers `event` to the listeners of its kind. Returns how many got it.
    pub fn push(&self, event: PushEvent) -> usize {
        let kind = event.kind();
        self.listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind)
            .filter(|l| l.tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn request_names(&self) -> Vec<&'static str> {
        self.requests.lock().iter().map(Request::name).collect()
    }

    pub fn count(&self, request: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.name() == request)
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn open(&self) -> Result<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_opens.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_opens.store(failing - 1, Ordering::SeqCst);
            return Err(FeedError::Connection("connection refused".into()));
        }
        Ok(())
    }

    async fn send_command(&self, request: Request) -> Result<Response> {
        let name = request.name();
        let payload_type = match &request {
            Request::ApplicationAuth(_) => PayloadType::ApplicationAuthRes,
            Request::AccountAuth(_) => PayloadType::AccountAuthRes,
            Request::SubscribeSpots(_) => PayloadType::SubscribeSpotsRes,
            Request::UnsubscribeSpots(_) => PayloadType::UnsubscribeSpotsRes,
            Request::SubscribeLiveTrendbar(_) => PayloadType::SubscribeLiveTrendbarRes,
            Request::UnsubscribeLiveTrendbar(_) => PayloadType::UnsubscribeLiveTrendbarRes,
            Request::SymbolsList(_) => PayloadType::SymbolsListRes,
            Request::SymbolById(_) => PayloadType::SymbolByIdRes,
            Request::GetTrendbars(_) => PayloadType::GetTrendbarsRes,
        };
        self.requests.lock().push(request);

        if let Some(code) = self.failures.lock().get(name) {
            return Err(FeedError::Upstream(ErrorResponse {
                ctid_trader_account_id: Some(ACCOUNT_ID),
                error_code: code.clone(),
                description: Some(format!("{name} rejected")),
                ..ErrorResponse::default()
            }));
        }

        let payload = self
            .replies
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "ctidTraderAccountId": ACCOUNT_ID }));
        Ok(Response {
            payload_type,
            payload,
        })
    }

    async fn send_heartbeat(&self) -> Result<()> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on(&self, kind: EventKind, listener: mpsc::UnboundedSender<PushEvent>) -> ListenerToken {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push(Listener {
            token,
            kind,
            tx: listener,
        });
        token
    }

    fn remove_event_listener(&self, token: ListenerToken) {
        self.listeners.lock().retain(|l| l.token != token);
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
