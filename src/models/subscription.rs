//! Spot and live trendbar subscription request payloads.

use serde::Serialize;

use super::TrendbarPeriod;

/// Starts spot events for the given symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeSpotsReq {
    pub ctid_trader_account_id: i64,
    pub symbol_id: Vec<i64>,
    /// Asks the server to stamp every spot event with its time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe_to_spot_timestamp: Option<bool>,
}

impl SubscribeSpotsReq {
    /// Creates a timestamped spot subscription for a single symbol.
    pub fn new(ctid_trader_account_id: i64, symbol_id: i64) -> Self {
        Self {
            ctid_trader_account_id,
            symbol_id: vec![symbol_id],
            subscribe_to_spot_timestamp: Some(true),
        }
    }
}

/// Stops spot events for the given symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeSpotsReq {
    pub ctid_trader_account_id: i64,
    pub symbol_id: Vec<i64>,
}

impl UnsubscribeSpotsReq {
    pub fn new(ctid_trader_account_id: i64, symbol_id: i64) -> Self {
        Self {
            ctid_trader_account_id,
            symbol_id: vec![symbol_id],
        }
    }
}

/// Adds live trendbar fragments for `period` to a symbol's spot events.
///
/// Requires an open spot subscription for the symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeLiveTrendbarReq {
    pub ctid_trader_account_id: i64,
    pub period: TrendbarPeriod,
    pub symbol_id: i64,
}

impl SubscribeLiveTrendbarReq {
    pub fn new(ctid_trader_account_id: i64, symbol_id: i64, period: TrendbarPeriod) -> Self {
        Self {
            ctid_trader_account_id,
            period,
            symbol_id,
        }
    }
}

/// Removes live trendbar fragments for `period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeLiveTrendbarReq {
    pub ctid_trader_account_id: i64,
    pub period: TrendbarPeriod,
    pub symbol_id: i64,
}

impl UnsubscribeLiveTrendbarReq {
    pub fn new(ctid_trader_account_id: i64, symbol_id: i64, period: TrendbarPeriod) -> Self {
        Self {
            ctid_trader_account_id,
            period,
            symbol_id,
        }
    }
}
