use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::HyperliquidError;

/// Default number of candles requested by [`crate::InfoClient::candles`].
pub const DEFAULT_CANDLE_LIMIT: u64 = 500;

/// Candle resolution accepted by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl CandleInterval {
    pub const ALL: [CandleInterval; 14] = [
        CandleInterval::OneMinute,
        CandleInterval::ThreeMinutes,
        CandleInterval::FiveMinutes,
        CandleInterval::FifteenMinutes,
        CandleInterval::ThirtyMinutes,
        CandleInterval::OneHour,
        CandleInterval::TwoHours,
        CandleInterval::FourHours,
        CandleInterval::EightHours,
        CandleInterval::TwelveHours,
        CandleInterval::OneDay,
        CandleInterval::ThreeDays,
        CandleInterval::OneWeek,
        CandleInterval::OneMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::ThreeMinutes => "3m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::ThirtyMinutes => "30m",
            CandleInterval::OneHour => "1h",
            CandleInterval::TwoHours => "2h",
            CandleInterval::FourHours => "4h",
            CandleInterval::EightHours => "8h",
            CandleInterval::TwelveHours => "12h",
            CandleInterval::OneDay => "1d",
            CandleInterval::ThreeDays => "3d",
            CandleInterval::OneWeek => "1w",
            CandleInterval::OneMonth => "1M",
        }
    }

    /// Width of one candle in milliseconds. A month counts as 30 days.
    pub fn millis(self) -> u64 {
        const MINUTE: u64 = 60_000;
        const HOUR: u64 = 60 * MINUTE;
        const DAY: u64 = 24 * HOUR;
        match self {
            CandleInterval::OneMinute => MINUTE,
            CandleInterval::ThreeMinutes => 3 * MINUTE,
            CandleInterval::FiveMinutes => 5 * MINUTE,
            CandleInterval::FifteenMinutes => 15 * MINUTE,
            CandleInterval::ThirtyMinutes => 30 * MINUTE,
            CandleInterval::OneHour => HOUR,
            CandleInterval::TwoHours => 2 * HOUR,
            CandleInterval::FourHours => 4 * HOUR,
            CandleInterval::EightHours => 8 * HOUR,
            CandleInterval::TwelveHours => 12 * HOUR,
            CandleInterval::OneDay => DAY,
            CandleInterval::ThreeDays => 3 * DAY,
            CandleInterval::OneWeek => 7 * DAY,
            CandleInterval::OneMonth => 30 * DAY,
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = HyperliquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CandleInterval::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| HyperliquidError::Validation(format!("unknown candle interval {s:?}")))
    }
}

/// `[start, end]` in epoch milliseconds covering `limit` candles that end
/// at `end_ms`.
pub fn candle_window(interval: CandleInterval, limit: u64, end_ms: u64) -> (u64, u64) {
    let span = interval.millis().saturating_mul(limit);
    (end_ms.saturating_sub(span), end_ms)
}

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, epoch milliseconds.
    #[serde(rename = "t")]
    pub open_time: u64,
    /// Close time, epoch milliseconds.
    #[serde(rename = "T")]
    pub close_time: u64,
    #[serde(rename = "s")]
    pub coin: String,
    #[serde(rename = "i")]
    pub interval: CandleInterval,
    pub o: Decimal,
    pub c: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub v: Decimal,
    /// Number of trades in the candle.
    #[serde(rename = "n", default)]
    pub trades: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_round_trips_through_str() {
        for interval in CandleInterval::ALL {
            assert_eq!(interval.as_str().parse::<CandleInterval>().unwrap(), interval);
        }
        assert!("2m".parse::<CandleInterval>().is_err());
    }

    #[test]
    fn month_and_minute_are_distinct() {
        assert_eq!("1m".parse::<CandleInterval>().unwrap().millis(), 60_000);
        assert_eq!(
            "1M".parse::<CandleInterval>().unwrap().millis(),
            2_592_000_000
        );
    }

    #[test]
    fn widths_match_table() {
        assert_eq!(CandleInterval::FifteenMinutes.millis(), 900_000);
        assert_eq!(CandleInterval::TwelveHours.millis(), 43_200_000);
        assert_eq!(CandleInterval::ThreeDays.millis(), 259_200_000);
        assert_eq!(CandleInterval::OneWeek.millis(), 604_800_000);
    }

    #[test]
    fn window_spans_limit_candles() {
        let (start, end) = candle_window(CandleInterval::OneHour, 500, 2_000_000_000);
        assert_eq!(end, 2_000_000_000);
        assert_eq!(end - start, 500 * 3_600_000);
    }

    #[test]
    fn window_saturates_at_epoch() {
        let (start, _) = candle_window(CandleInterval::OneMonth, 500, 1_000);
        assert_eq!(start, 0);
    }

    #[test]
    fn serializes_as_wire_code() {
        assert_eq!(
            serde_json::to_string(&CandleInterval::OneMonth).unwrap(),
            "\"1M\""
        );
    }
}
