//! Tick to candle aggregation.
//!
//! Every live bar subscriber owns a [`BarAggregator`]. Each spot event is
//! folded into the subscriber's current candle by [`next_bar`]: a tick in a
//! newer bucket rolls the bar over, a tick in the current bucket updates it
//! in place, and a tick in an older bucket is dropped.
//!
//! When the spot event carries the server's trendbar fragment for the
//! subscriber's period and bucket, the fragment is authoritative for high,
//! low and volume; the tick price is always the close. High and low are
//! widened to contain open and close so the candle stays well formed.
//!
//! Buckets are floored from the Unix epoch. For W1 that puts the bucket
//! start on a Thursday and for MN1 on a fixed 30-day grid, while the server
//! starts its weekly and monthly bars on calendar boundaries. Fragments for
//! those periods therefore never match the local bucket: W1 and MN1 candles
//! are built from tick prices alone and keep a volume of zero.

use rust_decimal::Decimal;
use tracing::debug;

use crate::clock::bucket_start;
use crate::models::{Candle, SpotEvent, Trendbar, TrendbarPeriod};
use crate::price::{from_wire, resolve_price};

/// Decoded trendbar fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fragment {
    bucket_start: i64,
    high: Decimal,
    low: Decimal,
    volume: i64,
}

impl Fragment {
    fn from_trendbar(trendbar: &Trendbar) -> Option<Self> {
        let low = trendbar.low?;
        let bucket_start = trendbar.bucket_start()?;
        let high = low.checked_add(trendbar.delta_high.unwrap_or(0))?;

        Some(Self {
            bucket_start,
            high: from_wire(high),
            low: from_wire(low),
            volume: trendbar.volume,
        })
    }
}

/// Computes the next candle for a subscriber.
///
/// Returns the new candle and its bucket start, or `None` when the tick must
/// be skipped (no usable price, no timestamp, or an out-of-order bucket).
pub fn next_bar(
    tick: &SpotEvent,
    period: TrendbarPeriod,
    previous_candle: Option<&Candle>,
    previous_bucket_start: Option<i64>,
) -> Option<(Candle, i64)> {
    let price = resolve_price(tick.bid, tick.ask)?;

    let fragment = tick.trendbar_for(period).and_then(Fragment::from_trendbar);
    let Some(timestamp) = tick
        .timestamp
        .or_else(|| fragment.as_ref().map(|f| f.bucket_start))
    else {
        debug!(symbol_id = tick.symbol_id, %period, "Tick without timestamp, skipping");
        return None;
    };
    let Some(bucket) = bucket_start(timestamp, period) else {
        debug!(
            symbol_id = tick.symbol_id,
            %period,
            timestamp,
            "Tick timestamp out of range, skipping"
        );
        return None;
    };

    if let Some(previous) = previous_bucket_start
        && bucket < previous
    {
        debug!(
            symbol_id = tick.symbol_id,
            %period,
            bucket,
            current = previous,
            "Out-of-order tick for an older bucket, ignoring"
        );
        return None;
    }

    let fragment = fragment.filter(|f| {
        let matches = f.bucket_start == bucket;
        if !matches {
            debug!(
                symbol_id = tick.symbol_id,
                %period,
                fragment_bucket = f.bucket_start,
                bucket,
                "Trendbar fragment for another bucket, ignoring"
            );
        }
        matches
    });

    let mut candle = match previous_candle {
        Some(previous) if previous_bucket_start == Some(bucket) => {
            let mut candle = previous.clone();
            candle.high = candle.high.max(price);
            candle.low = candle.low.min(price);
            candle.close = price;
            candle
        }
        _ => Candle::flat(bucket, price),
    };

    if let Some(fragment) = fragment {
        candle.high = fragment.high;
        candle.low = fragment.low;
        candle.volume = fragment.volume;
    }
    candle.high = candle.high.max(candle.open).max(candle.close);
    candle.low = candle.low.min(candle.open).min(candle.close);

    Some((candle, bucket))
}

/// Aggregation state of one subscriber.
///
/// Uninitialized until the first accepted tick, then always holds the
/// candle of the most recent bucket.
#[derive(Debug, Clone, Default)]
pub struct BarAggregator {
    last_candle: Option<Candle>,
    last_bucket_start: Option<i64>,
}

impl BarAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a candle has been produced.
    pub fn is_initialized(&self) -> bool {
        self.last_bucket_start.is_some()
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.last_candle.as_ref()
    }

    pub fn last_bucket_start(&self) -> Option<i64> {
        self.last_bucket_start
    }

    /// Folds a tick into the state and returns the candle to emit.
    pub fn advance(&mut self, tick: &SpotEvent, period: TrendbarPeriod) -> Option<Candle> {
        let (candle, bucket) = next_bar(
            tick,
            period,
            self.last_candle.as_ref(),
            self.last_bucket_start,
        )?;
        self.last_candle = Some(candle.clone());
        self.last_bucket_start = Some(bucket);
        Some(candle)
    }

    /// Forgets the current candle.
    pub fn reset(&mut self) {
        self.last_candle = None;
        self.last_bucket_start = None;
    }
}
