//! Bar bucketing.

use crate::models::TrendbarPeriod;

/// Returns the start of the bucket of width `period_ms` containing
/// `timestamp_ms`.
///
/// Timestamps before the epoch floor towards negative infinity.
/// `period_ms` must be positive. Returns `None` when the bucket start is
/// not representable.
pub fn bucket_start_ms(timestamp_ms: i64, period_ms: i64) -> Option<i64> {
    timestamp_ms.div_euclid(period_ms).checked_mul(period_ms)
}

/// Returns the start of the `period` bucket containing `timestamp_ms`.
pub fn bucket_start(timestamp_ms: i64, period: TrendbarPeriod) -> Option<i64> {
    bucket_start_ms(timestamp_ms, period.as_millis())
}
