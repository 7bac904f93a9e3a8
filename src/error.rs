//! Crate-level error types.
//!
//! [`FeedError`] unifies every error source (configuration, transport,
//! authentication, subscriptions) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator for
//! easy propagation.

use crate::models::{ErrorResponse, TrendbarPeriod};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Server error code returned when a subscription already exists.
pub const ALREADY_SUBSCRIBED: &str = "ALREADY_SUBSCRIBED";

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Configuration could not be loaded from the environment or keychain.
    #[error("configuration error: {0}")]
    Config(String),

    /// Opening the connection failed, or it is not open.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The application (client id / secret) was rejected.
    #[error("application authentication failed: {0}")]
    ApplicationAuthentication(String),

    /// The trading account (access token / account id) was rejected.
    #[error("user authentication failed: {0}")]
    UserAuthentication(String),

    /// The upstream spot (tick) subscription for a symbol failed.
    #[error("tick subscription failed for symbol {symbol_id}")]
    SubscribeTick {
        symbol_id: i64,
        #[source]
        source: Box<FeedError>,
    },

    /// The upstream live trendbar subscription failed.
    #[error("bar subscription failed for symbol {symbol_id} period {period}")]
    SubscribeBar {
        symbol_id: i64,
        period: TrendbarPeriod,
        #[source]
        source: Box<FeedError>,
    },

    /// The upstream live trendbar unsubscription failed.
    #[error("bar unsubscription failed for symbol {symbol_id} period {period}")]
    UnsubscribeBar {
        symbol_id: i64,
        period: TrendbarPeriod,
        #[source]
        source: Box<FeedError>,
    },

    /// The upstream spot unsubscription failed.
    #[error("tick unsubscription failed for symbol {symbol_id}")]
    UnsubscribeTick {
        symbol_id: i64,
        #[source]
        source: Box<FeedError>,
    },

    /// Listing the account's symbols failed.
    #[error("symbols list request failed")]
    GetSymbolsList {
        #[source]
        source: Box<FeedError>,
    },

    /// Fetching symbol details failed.
    #[error("symbol details request failed for symbols {symbol_ids:?}")]
    GetSymbolsDetails {
        symbol_ids: Vec<i64>,
        #[source]
        source: Box<FeedError>,
    },

    /// Fetching historical trendbars failed.
    #[error("trendbars request failed for symbol {symbol_id} period {period}")]
    GetTrendBars {
        symbol_id: i64,
        period: TrendbarPeriod,
        #[source]
        source: Box<FeedError>,
    },

    /// A period name, wire value or unit is not supported.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// An operation was attempted before the client reached `Ready`.
    #[error("client is not ready")]
    ClientNotReady,

    /// The server answered a request with an error payload.
    #[error("upstream error {}: {}", .0.error_code, .0.description.as_deref().unwrap_or("no description"))]
    Upstream(ErrorResponse),

    /// A request got no response in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// A frame could not be interpreted.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedError {
    /// Returns `true` if the server reported the subscription as already open.
    ///
    /// Subscribe calls treat this as success.
    pub fn is_already_subscribed(&self) -> bool {
        matches!(self, Self::Upstream(res) if res.error_code == ALREADY_SUBSCRIBED)
    }
}
