//! Representative price from a bid/ask pair.
//!
//! Spot prices arrive as integers in 1/100000 of a price unit. A candle
//! is only ever fed prices that survive the checks in [`resolve_price`].

use rust_decimal::Decimal;
use tracing::warn;

/// Decimal places of the fixed-point wire prices.
pub const PRICE_SCALE: u32 = 5;

/// Upper bound for a plausible price in the symbol's price units.
const MAX_PLAUSIBLE_PRICE: i64 = 1_000_000;

/// Converts a fixed-point wire price to a [`Decimal`].
pub fn from_wire(raw: i64) -> Decimal {
    Decimal::new(raw, PRICE_SCALE)
}

/// Resolves the price used for aggregation.
///
/// Returns the bid/ask midpoint when both sides are positive, the single
/// positive side otherwise, and `None` when no side is usable or the result
/// fails the sanity checks.
pub fn resolve_price(bid: Option<i64>, ask: Option<i64>) -> Option<Decimal> {
    let bid = bid.filter(|v| *v > 0);
    let ask = ask.filter(|v| *v > 0);

    let price = match (bid, ask) {
        (Some(bid), Some(ask)) => {
            let Some(sum) = bid.checked_add(ask) else {
                warn!(bid, ask, "Bid/ask sum overflows, dropping tick");
                return None;
            };
            from_wire(sum) / Decimal::TWO
        }
        (Some(side), None) | (None, Some(side)) => from_wire(side),
        (None, None) => return None,
    };

    if price <= Decimal::ZERO || price > Decimal::from(MAX_PLAUSIBLE_PRICE) {
        warn!(%price, ?bid, ?ask, "Implausible price, dropping tick");
        return None;
    }

    Some(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn midpoint_when_both_sides_present() {
        assert_eq!(resolve_price(Some(110_000), Some(110_020)), Some(dec!(1.1001)));
        assert_eq!(resolve_price(Some(1), Some(2)), Some(dec!(0.000015)));
    }

    #[test]
    fn single_side_is_used_as_is() {
        assert_eq!(resolve_price(Some(123_000), None), Some(dec!(1.23)));
        assert_eq!(resolve_price(None, Some(53_423_782)), Some(dec!(534.23782)));
    }

    #[test]
    fn non_positive_sides_are_ignored() {
        assert_eq!(resolve_price(Some(0), Some(110_020)), Some(dec!(1.1002)));
        assert_eq!(resolve_price(Some(110_000), Some(-5)), Some(dec!(1.1)));
        assert_eq!(resolve_price(Some(0), Some(0)), None);
        assert_eq!(resolve_price(Some(-1), None), None);
        assert_eq!(resolve_price(None, None), None);
    }

    #[test]
    fn implausible_prices_are_rejected() {
        // 1,000,000.00001 in price units
        assert_eq!(resolve_price(Some(100_000_000_001), None), None);
        assert_eq!(
            resolve_price(Some(100_000_000_000), None),
            Some(dec!(1000000))
        );
        assert_eq!(resolve_price(Some(i64::MAX), Some(i64::MAX)), None);
    }
}
