//! Live trendbar periods.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::FeedError;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Bar period supported by the platform.
///
/// Serialized as its wire value (`M1` = 1 … `MN1` = 14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TrendbarPeriod {
    M1 = 1,
    M2 = 2,
    M3 = 3,
    M4 = 4,
    M5 = 5,
    M10 = 6,
    M15 = 7,
    M30 = 8,
    H1 = 9,
    H4 = 10,
    H12 = 11,
    D1 = 12,
    W1 = 13,
    /// One month, bucketed as a fixed 30 days.
    MN1 = 14,
}

impl TrendbarPeriod {
    /// All periods in ascending order.
    pub const ALL: [TrendbarPeriod; 14] = [
        Self::M1,
        Self::M2,
        Self::M3,
        Self::M4,
        Self::M5,
        Self::M10,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H4,
        Self::H12,
        Self::D1,
        Self::W1,
        Self::MN1,
    ];

    /// Returns the canonical name, e.g. `"M15"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "M1",
            Self::M2 => "M2",
            Self::M3 => "M3",
            Self::M4 => "M4",
            Self::M5 => "M5",
            Self::M10 => "M10",
            Self::M15 => "M15",
            Self::M30 => "M30",
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::H12 => "H12",
            Self::D1 => "D1",
            Self::W1 => "W1",
            Self::MN1 => "MN1",
        }
    }

    /// Bucket width in milliseconds.
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::M1 => MINUTE_MS,
            Self::M2 => 2 * MINUTE_MS,
            Self::M3 => 3 * MINUTE_MS,
            Self::M4 => 4 * MINUTE_MS,
            Self::M5 => 5 * MINUTE_MS,
            Self::M10 => 10 * MINUTE_MS,
            Self::M15 => 15 * MINUTE_MS,
            Self::M30 => 30 * MINUTE_MS,
            Self::H1 => HOUR_MS,
            Self::H4 => 4 * HOUR_MS,
            Self::H12 => 12 * HOUR_MS,
            Self::D1 => DAY_MS,
            Self::W1 => 7 * DAY_MS,
            Self::MN1 => 30 * DAY_MS,
        }
    }

    /// Bucket width as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.as_millis().unsigned_abs())
    }
}

impl fmt::Display for TrendbarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TrendbarPeriod> for u8 {
    fn from(period: TrendbarPeriod) -> Self {
        period as u8
    }
}

impl TryFrom<u8> for TrendbarPeriod {
    type Error = FeedError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|p| u8::from(*p) == value)
            .ok_or_else(|| FeedError::InvalidPeriod(format!("unknown wire value {value}")))
    }
}

impl FromStr for TrendbarPeriod {
    type Err = FeedError;

    /// Parses `<unit><amount>` where unit is `M` (minutes), `H` (hours),
    /// `D` (days), `W` (weeks) or `MN` (months), case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let split = upper
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| FeedError::InvalidPeriod(format!("missing amount in `{s}`")))?;
        let (unit, amount) = upper.split_at(split);
        let amount: u32 = amount
            .parse()
            .map_err(|_| FeedError::InvalidPeriod(format!("invalid amount in `{s}`")))?;

        let period = match (unit, amount) {
            ("M", 1) => Self::M1,
            ("M", 2) => Self::M2,
            ("M", 3) => Self::M3,
            ("M", 4) => Self::M4,
            ("M", 5) => Self::M5,
            ("M", 10) => Self::M10,
            ("M", 15) => Self::M15,
            ("M", 30) => Self::M30,
            ("H", 1) => Self::H1,
            ("H", 4) => Self::H4,
            ("H", 12) => Self::H12,
            ("D", 1) => Self::D1,
            ("W", 1) => Self::W1,
            ("MN", 1) => Self::MN1,
            ("M" | "H" | "D" | "W" | "MN", _) => {
                return Err(FeedError::InvalidPeriod(format!(
                    "unsupported multiple {amount} for unit `{unit}`"
                )));
            }
            _ => {
                return Err(FeedError::InvalidPeriod(format!(
                    "unknown unit `{unit}` in `{s}`"
                )));
            }
        };

        Ok(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names() {
        for period in TrendbarPeriod::ALL {
            assert_eq!(period.as_str().parse::<TrendbarPeriod>().unwrap(), period);
        }
        assert_eq!("mn1".parse::<TrendbarPeriod>().unwrap(), TrendbarPeriod::MN1);
        assert_eq!(" h4 ".parse::<TrendbarPeriod>().unwrap(), TrendbarPeriod::H4);
    }

    #[test]
    fn rejects_unknown_units_and_multiples() {
        let err = "Y1".parse::<TrendbarPeriod>().unwrap_err();
        assert!(matches!(err, FeedError::InvalidPeriod(_)));
        assert!(err.to_string().contains("unknown unit"));

        let err = "M7".parse::<TrendbarPeriod>().unwrap_err();
        assert!(err.to_string().contains("unsupported multiple"));

        assert!("M".parse::<TrendbarPeriod>().is_err());
        assert!("".parse::<TrendbarPeriod>().is_err());
    }

    #[test]
    fn wire_values_round_trip() {
        assert_eq!(u8::from(TrendbarPeriod::M1), 1);
        assert_eq!(u8::from(TrendbarPeriod::M10), 6);
        assert_eq!(u8::from(TrendbarPeriod::MN1), 14);
        assert_eq!(TrendbarPeriod::try_from(9).unwrap(), TrendbarPeriod::H1);
        assert!(TrendbarPeriod::try_from(0).is_err());
        assert!(TrendbarPeriod::try_from(15).is_err());

        let json = serde_json::to_string(&TrendbarPeriod::H4).unwrap();
        assert_eq!(json, "10");
        let parsed: TrendbarPeriod = serde_json::from_str("13").unwrap();
        assert_eq!(parsed, TrendbarPeriod::W1);
        assert!(serde_json::from_str::<TrendbarPeriod>("99").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(TrendbarPeriod::M1.as_millis(), 60_000);
        assert_eq!(TrendbarPeriod::M15.duration(), Duration::from_secs(900));
        assert_eq!(TrendbarPeriod::H12.as_millis(), 43_200_000);
        assert_eq!(TrendbarPeriod::W1.as_millis(), 604_800_000);
        assert_eq!(TrendbarPeriod::MN1.as_millis(), 2_592_000_000);
    }
}
