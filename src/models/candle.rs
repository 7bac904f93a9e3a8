//! OHLCV candle models delivered to live bar subscribers.

use rust_decimal::Decimal;
use serde::Serialize;

use super::TrendbarPeriod;

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candle {
    /// Start timestamp of this candle's bucket, in milliseconds.
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume as accumulated by the server, zero until a fragment arrives.
    pub volume: i64,
}

impl Candle {
    /// Creates a candle whose four prices all equal `price`.
    pub fn flat(time: i64, price: Decimal) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
        }
    }

    /// Rounds the four prices to `digits` decimal places.
    pub fn round_dp(mut self, digits: u32) -> Self {
        self.open = self.open.round_dp(digits);
        self.high = self.high.round_dp(digits);
        self.low = self.low.round_dp(digits);
        self.close = self.close.round_dp(digits);
        self
    }
}

/// A candle update for one live bar subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveBar {
    pub symbol_id: i64,
    pub period: TrendbarPeriod,
    pub candle: Candle,
}
