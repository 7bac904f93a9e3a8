//! Symbol catalog and historical trendbar payloads.

use serde::{Deserialize, Serialize};

use super::{Trendbar, TrendbarPeriod};

/// Lists the symbols available to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolsListReq {
    pub ctid_trader_account_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_archived_symbols: Option<bool>,
}

/// Short symbol entry from the symbols list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSymbol {
    pub symbol_id: i64,
    #[serde(default)]
    pub symbol_name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub base_asset_id: Option<i64>,
    #[serde(default)]
    pub quote_asset_id: Option<i64>,
    #[serde(default)]
    pub symbol_category_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sorting_number: Option<f64>,
}

/// A symbol that is no longer traded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedSymbol {
    pub symbol_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub utc_last_update_timestamp: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolsListRes {
    #[serde(default)]
    pub symbol: Vec<LightSymbol>,
    #[serde(default)]
    pub archived_symbol: Vec<ArchivedSymbol>,
}

/// Requests full details for the given symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolByIdReq {
    pub ctid_trader_account_id: i64,
    pub symbol_id: Vec<i64>,
}

/// Trading details of a symbol.
///
/// Volumes are in cents of a unit, as on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub symbol_id: i64,
    /// Decimal places of the symbol's prices.
    pub digits: u32,
    pub pip_position: i32,
    #[serde(default)]
    pub enable_short_selling: Option<bool>,
    #[serde(default)]
    pub lot_size: Option<i64>,
    #[serde(default)]
    pub min_volume: Option<i64>,
    #[serde(default)]
    pub max_volume: Option<i64>,
    #[serde(default)]
    pub step_volume: Option<i64>,
    #[serde(default)]
    pub swap_long: Option<f64>,
    #[serde(default)]
    pub swap_short: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schedule_time_zone: Option<String>,
    #[serde(default)]
    pub measurement_units: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolByIdRes {
    #[serde(default)]
    pub symbol: Vec<Symbol>,
    #[serde(default)]
    pub archived_symbol: Vec<ArchivedSymbol>,
}

/// Requests closed historical trendbars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTrendbarsReq {
    pub ctid_trader_account_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_timestamp: Option<i64>,
    pub period: TrendbarPeriod,
    pub symbol_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTrendbarsRes {
    #[serde(default)]
    pub period: Option<TrendbarPeriod>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub trendbar: Vec<Trendbar>,
    #[serde(default)]
    pub symbol_id: Option<i64>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// Which historical bars to fetch.
///
/// Timestamps are milliseconds since the epoch. The server caps the number
/// of bars per response; [`GetTrendbarsRes::has_more`] tells when more are
/// available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendbarsQuery {
    pub symbol_id: i64,
    pub period: TrendbarPeriod,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    pub count: Option<u32>,
}

impl TrendbarsQuery {
    pub fn new(symbol_id: i64, period: TrendbarPeriod) -> Self {
        Self {
            symbol_id,
            period,
            from_timestamp: None,
            to_timestamp: None,
            count: None,
        }
    }

    /// Restricts the bars to `[from, to]`.
    pub fn between(mut self, from_timestamp: i64, to_timestamp: i64) -> Self {
        self.from_timestamp = Some(from_timestamp);
        self.to_timestamp = Some(to_timestamp);
        self
    }

    /// Limits the number of bars returned.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn into_request(self, ctid_trader_account_id: i64) -> GetTrendbarsReq {
        GetTrendbarsReq {
            ctid_trader_account_id,
            from_timestamp: self.from_timestamp,
            to_timestamp: self.to_timestamp,
            period: self.period,
            symbol_id: self.symbol_id,
            count: self.count,
        }
    }
}

/// A listed symbol merged with its trading details.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub details: Symbol,
    /// The list entry with the symbol's name, if the list carried one.
    pub listing: Option<LightSymbol>,
}

impl SymbolInfo {
    pub fn symbol_id(&self) -> i64 {
        self.details.symbol_id
    }

    pub fn name(&self) -> Option<&str> {
        self.listing.as_ref()?.symbol_name.as_deref()
    }
}
