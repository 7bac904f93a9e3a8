//! Shared models for Open API messages.
//!
//! Contains the payload-type catalog for the message kinds this crate
//! exchanges, typed request payloads, push events and the server error
//! response.

pub mod auth;
pub mod candle;
pub mod period;
pub mod spot;
pub mod subscription;
pub mod symbol;

use serde::{Deserialize, Serialize};

pub use auth::{AccountAuthReq, ApplicationAuthReq};
pub use candle::{Candle, LiveBar};
pub use period::TrendbarPeriod;
pub use spot::{SpotEvent, Trendbar};
pub use subscription::{
    SubscribeLiveTrendbarReq, SubscribeSpotsReq, UnsubscribeLiveTrendbarReq, UnsubscribeSpotsReq,
};
pub use symbol::{
    ArchivedSymbol, GetTrendbarsReq, GetTrendbarsRes, LightSymbol, Symbol, SymbolByIdReq,
    SymbolByIdRes, SymbolInfo, SymbolsListReq, SymbolsListRes, TrendbarsQuery,
};

/// Numeric message identifiers used in the `payloadType` envelope field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// Common error response (`ProtoErrorRes`).
    ErrorRes = 50,
    HeartbeatEvent = 51,
    ApplicationAuthReq = 2100,
    ApplicationAuthRes = 2101,
    AccountAuthReq = 2102,
    AccountAuthRes = 2103,
    SymbolsListReq = 2114,
    SymbolsListRes = 2115,
    SymbolByIdReq = 2116,
    SymbolByIdRes = 2117,
    SubscribeSpotsReq = 2127,
    SubscribeSpotsRes = 2128,
    UnsubscribeSpotsReq = 2129,
    UnsubscribeSpotsRes = 2130,
    SpotEvent = 2131,
    SubscribeLiveTrendbarReq = 2135,
    UnsubscribeLiveTrendbarReq = 2136,
    GetTrendbarsReq = 2137,
    GetTrendbarsRes = 2138,
    /// Open API error response (`ProtoOAErrorRes`).
    OaErrorRes = 2142,
    ClientDisconnectEvent = 2148,
    AccountDisconnectEvent = 2164,
    SubscribeLiveTrendbarRes = 2165,
    UnsubscribeLiveTrendbarRes = 2166,
}

impl PayloadType {
    const ALL: [PayloadType; 24] = [
        Self::ErrorRes,
        Self::HeartbeatEvent,
        Self::ApplicationAuthReq,
        Self::ApplicationAuthRes,
        Self::AccountAuthReq,
        Self::AccountAuthRes,
        Self::SymbolsListReq,
        Self::SymbolsListRes,
        Self::SymbolByIdReq,
        Self::SymbolByIdRes,
        Self::SubscribeSpotsReq,
        Self::SubscribeSpotsRes,
        Self::UnsubscribeSpotsReq,
        Self::UnsubscribeSpotsRes,
        Self::SpotEvent,
        Self::SubscribeLiveTrendbarReq,
        Self::UnsubscribeLiveTrendbarReq,
        Self::GetTrendbarsReq,
        Self::GetTrendbarsRes,
        Self::OaErrorRes,
        Self::ClientDisconnectEvent,
        Self::AccountDisconnectEvent,
        Self::SubscribeLiveTrendbarRes,
        Self::UnsubscribeLiveTrendbarRes,
    ];

    /// Returns the wire value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Looks up a known payload type by wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_u32() == value)
    }

    /// Returns `true` for the two error response kinds.
    pub fn is_error(self) -> bool {
        matches!(self, Self::ErrorRes | Self::OaErrorRes)
    }
}

/// Push-event kinds a listener can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Bid/ask tick, optionally carrying live trendbar fragments.
    Spot,
    Heartbeat,
    ClientDisconnect,
    AccountDisconnect,
}

impl EventKind {
    /// Returns a short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Spot => "spot",
            EventKind::Heartbeat => "heartbeat",
            EventKind::ClientDisconnect => "client_disconnect",
            EventKind::AccountDisconnect => "account_disconnect",
        }
    }

    /// Returns the payload type that carries this event.
    pub fn payload_type(&self) -> PayloadType {
        match self {
            EventKind::Spot => PayloadType::SpotEvent,
            EventKind::Heartbeat => PayloadType::HeartbeatEvent,
            EventKind::ClientDisconnect => PayloadType::ClientDisconnectEvent,
            EventKind::AccountDisconnect => PayloadType::AccountDisconnectEvent,
        }
    }
}

/// A server-initiated message.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Spot(SpotEvent),
    Heartbeat,
    ClientDisconnect(ClientDisconnectEvent),
    AccountDisconnect(AccountDisconnectEvent),
}

impl PushEvent {
    /// Returns the kind listeners are keyed by.
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::Spot(_) => EventKind::Spot,
            PushEvent::Heartbeat => EventKind::Heartbeat,
            PushEvent::ClientDisconnect(_) => EventKind::ClientDisconnect,
            PushEvent::AccountDisconnect(_) => EventKind::AccountDisconnect,
        }
    }
}

/// A typed command sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ApplicationAuth(ApplicationAuthReq),
    AccountAuth(AccountAuthReq),
    SubscribeSpots(SubscribeSpotsReq),
    UnsubscribeSpots(UnsubscribeSpotsReq),
    SubscribeLiveTrendbar(SubscribeLiveTrendbarReq),
    UnsubscribeLiveTrendbar(UnsubscribeLiveTrendbarReq),
    SymbolsList(SymbolsListReq),
    SymbolById(SymbolByIdReq),
    GetTrendbars(GetTrendbarsReq),
}

impl Request {
    /// Returns the payload type written into the envelope.
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Request::ApplicationAuth(_) => PayloadType::ApplicationAuthReq,
            Request::AccountAuth(_) => PayloadType::AccountAuthReq,
            Request::SubscribeSpots(_) => PayloadType::SubscribeSpotsReq,
            Request::UnsubscribeSpots(_) => PayloadType::UnsubscribeSpotsReq,
            Request::SubscribeLiveTrendbar(_) => PayloadType::SubscribeLiveTrendbarReq,
            Request::UnsubscribeLiveTrendbar(_) => PayloadType::UnsubscribeLiveTrendbarReq,
            Request::SymbolsList(_) => PayloadType::SymbolsListReq,
            Request::SymbolById(_) => PayloadType::SymbolByIdReq,
            Request::GetTrendbars(_) => PayloadType::GetTrendbarsReq,
        }
    }

    /// Returns a short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::ApplicationAuth(_) => "application_auth",
            Request::AccountAuth(_) => "account_auth",
            Request::SubscribeSpots(_) => "subscribe_spots",
            Request::UnsubscribeSpots(_) => "unsubscribe_spots",
            Request::SubscribeLiveTrendbar(_) => "subscribe_live_trendbar",
            Request::UnsubscribeLiveTrendbar(_) => "unsubscribe_live_trendbar",
            Request::SymbolsList(_) => "symbols_list",
            Request::SymbolById(_) => "symbol_by_id",
            Request::GetTrendbars(_) => "get_trendbars",
        }
    }

    /// Serializes the inner payload.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Request::ApplicationAuth(req) => serde_json::to_value(req),
            Request::AccountAuth(req) => serde_json::to_value(req),
            Request::SubscribeSpots(req) => serde_json::to_value(req),
            Request::UnsubscribeSpots(req) => serde_json::to_value(req),
            Request::SubscribeLiveTrendbar(req) => serde_json::to_value(req),
            Request::UnsubscribeLiveTrendbar(req) => serde_json::to_value(req),
            Request::SymbolsList(req) => serde_json::to_value(req),
            Request::SymbolById(req) => serde_json::to_value(req),
            Request::GetTrendbars(req) => serde_json::to_value(req),
        }
    }
}

/// Error payload returned by the server in place of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctid_trader_account_id: Option<i64>,
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unix time in seconds when a maintenance window ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_end_timestamp: Option<i64>,
    /// Seconds until a rate-limited payload type is unlocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// The server is closing the whole client connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDisconnectEvent {
    #[serde(default)]
    pub reason: Option<String>,
}

/// A single trading account was logged out by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDisconnectEvent {
    pub ctid_trader_account_id: i64,
}
