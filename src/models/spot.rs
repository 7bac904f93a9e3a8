//! Spot (tick) event models.

use serde::Deserialize;

use super::{Candle, TrendbarPeriod};
use crate::price::from_wire;

/// A bid/ask update for one symbol, pushed after a spot subscription.
///
/// Prices are fixed-point integers in 1/100000 of a price unit
/// (123000 means 1.23).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotEvent {
    #[serde(default)]
    pub ctid_trader_account_id: i64,
    pub symbol_id: i64,
    #[serde(default)]
    pub bid: Option<i64>,
    #[serde(default)]
    pub ask: Option<i64>,
    /// Live trendbar fragments, one per subscribed period.
    #[serde(default)]
    pub trendbar: Vec<Trendbar>,
    #[serde(default)]
    pub session_close: Option<i64>,
    /// Spot time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl SpotEvent {
    /// Returns the fragment for `period`, if the event carries one.
    pub fn trendbar_for(&self, period: TrendbarPeriod) -> Option<&Trendbar> {
        self.trendbar.iter().find(|tb| tb.period == Some(period))
    }
}

/// Server-maintained accumulator for the currently forming bar.
///
/// Open and high are deltas from `low`; all prices use the same
/// 1/100000 scaling as spot prices.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trendbar {
    #[serde(default)]
    pub volume: i64,
    #[serde(default)]
    pub period: Option<TrendbarPeriod>,
    #[serde(default)]
    pub low: Option<i64>,
    #[serde(default)]
    pub delta_open: Option<i64>,
    #[serde(default)]
    pub delta_close: Option<i64>,
    #[serde(default)]
    pub delta_high: Option<i64>,
    #[serde(default)]
    pub utc_timestamp_in_minutes: Option<i64>,
}

impl Trendbar {
    /// Start of the bar in milliseconds since the epoch.
    ///
    /// `None` when the fragment carries no start or it does not fit in
    /// milliseconds.
    pub fn bucket_start(&self) -> Option<i64> {
        self.utc_timestamp_in_minutes?.checked_mul(60_000)
    }

    /// Converts a closed historical bar into a candle.
    ///
    /// Returns `None` when the bar lacks its low price or start time, or a
    /// price does not fit.
    pub fn to_candle(&self) -> Option<Candle> {
        let low = self.low?;
        let price = |delta: Option<i64>| low.checked_add(delta.unwrap_or(0)).map(from_wire);

        Some(Candle {
            time: self.bucket_start()?,
            open: price(self.delta_open)?,
            high: price(self.delta_high)?,
            low: from_wire(low),
            close: price(self.delta_close)?,
            volume: self.volume,
        })
    }
}
