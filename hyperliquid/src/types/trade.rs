//! Trades and the ingestion adapter that normalizes their wire shapes.
//!
//! The exchange (and proxies in front of it) are not consistent about field
//! names: price may arrive as `px` or `p`, size as `sz` or `s`, time as
//! `time` or `t`, and the aggressor as `side` or a `buyerIsTaker` flag.
//! [`Trade::from_value`] is the only place that knows about this.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerSide {
    Buy,
    Sell,
}

impl TakerSide {
    /// Map the side spellings seen on the wire. `B` / `A` are the exchange's
    /// bid / ask codes for the aggressor.
    fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "buy" | "Buy" | "BUY" | "B" | "b" | "bid" => Some(TakerSide::Buy),
            "sell" | "Sell" | "SELL" | "A" | "a" | "ask" => Some(TakerSide::Sell),
            _ => None,
        }
    }
}

/// Canonical trade record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default)]
    pub coin: String,
    pub px: Decimal,
    pub sz: Decimal,
    pub side: TakerSide,
    /// Epoch milliseconds.
    pub time: u64,
}

impl Trade {
    /// Normalize one trade record from any supported wire shape.
    ///
    /// Never fails: a missing or unparsable price or size becomes zero, a
    /// missing time becomes the current time.
    pub fn from_value(value: &Value) -> Self {
        Self::from_value_at(value, epoch_ms())
    }

    /// Like [`Trade::from_value`] with an explicit fallback time.
    pub fn from_value_at(value: &Value, now_ms: u64) -> Self {
        let coin = first_present(value, &["coin"])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let px = first_present(value, &["px", "p"])
            .and_then(value_to_decimal)
            .unwrap_or(Decimal::ZERO);
        let sz = first_present(value, &["sz", "s"])
            .and_then(value_to_decimal)
            .unwrap_or(Decimal::ZERO);
        let side = first_present(value, &["side"])
            .and_then(Value::as_str)
            .and_then(TakerSide::from_wire)
            .unwrap_or_else(|| {
                let buyer_is_taker = value
                    .get("buyerIsTaker")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if buyer_is_taker {
                    TakerSide::Buy
                } else {
                    TakerSide::Sell
                }
            });
        let time = first_present(value, &["time", "t"])
            .and_then(value_to_u64)
            .unwrap_or(now_ms);

        Self {
            coin,
            px,
            sz,
            side,
            time,
        }
    }

    /// Trade time as a UTC timestamp.
    pub fn time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(i64::try_from(self.time).ok()?)
    }
}

/// A batch of trades for one coin, as pushed by the `trades` channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeBatch {
    pub coin: String,
    pub trades: Vec<Trade>,
}

impl TradeBatch {
    /// Normalize a pushed array. Returns `None` for non-arrays and empty
    /// arrays since there is no coin to attribute them to.
    pub fn from_value(value: &Value) -> Option<Self> {
        let trades: Vec<Trade> = value.as_array()?.iter().map(Trade::from_value).collect();
        let coin = trades.first()?.coin.clone();
        Some(Self { coin, trades })
    }
}

/// First key whose value is present and not `null`.
fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !v.is_null())
}

/// Parse a JSON string or number as a decimal.
pub(crate) fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

/// Parse plain or scientific decimal notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn long_field_names() {
        let t = Trade::from_value_at(
            &json!({"coin": "BTC", "px": "50000.5", "sz": "0.25", "side": "buy", "time": 1700000000000u64}),
            0,
        );
        assert_eq!(t.coin, "BTC");
        assert_eq!(t.px, dec!(50000.5));
        assert_eq!(t.sz, dec!(0.25));
        assert_eq!(t.side, TakerSide::Buy);
        assert_eq!(t.time, 1_700_000_000_000);
    }

    #[test]
    fn short_field_names_and_buyer_flag() {
        let t = Trade::from_value_at(
            &json!({"p": 101.5, "s": 2, "buyerIsTaker": true, "t": "1700000000001"}),
            0,
        );
        assert_eq!(t.px, dec!(101.5));
        assert_eq!(t.sz, dec!(2));
        assert_eq!(t.side, TakerSide::Buy);
        assert_eq!(t.time, 1_700_000_000_001);
    }

    #[test]
    fn exchange_side_codes() {
        let bid = Trade::from_value_at(&json!({"px": "1", "sz": "1", "side": "B"}), 0);
        let ask = Trade::from_value_at(&json!({"px": "1", "sz": "1", "side": "A"}), 0);
        assert_eq!(bid.side, TakerSide::Buy);
        assert_eq!(ask.side, TakerSide::Sell);
    }

    #[test]
    fn missing_fields_fall_back() {
        let t = Trade::from_value_at(&json!({}), 42);
        assert_eq!(t.px, Decimal::ZERO);
        assert_eq!(t.sz, Decimal::ZERO);
        assert_eq!(t.side, TakerSide::Sell);
        assert_eq!(t.time, 42);
    }

    #[test]
    fn null_long_name_falls_through_to_short() {
        let t = Trade::from_value_at(&json!({"px": null, "p": "7"}), 0);
        assert_eq!(t.px, dec!(7));
    }

    #[test]
    fn unparsable_price_is_zero() {
        let t = Trade::from_value_at(&json!({"px": "abc", "p": "7"}), 0);
        assert_eq!(t.px, Decimal::ZERO);
    }

    #[test]
    fn scientific_notation_parses() {
        assert_eq!(parse_decimal("1e-3"), Some(dec!(0.001)));
        assert_eq!(parse_decimal(" 12.5 "), Some(dec!(12.5)));
        assert_eq!(parse_decimal("NaN"), None);
    }

    #[test]
    fn batch_takes_coin_from_first_trade() {
        let batch = TradeBatch::from_value(&json!([
            {"coin": "ETH", "px": "3000", "sz": "1", "side": "B", "time": 1},
            {"coin": "ETH", "px": "3001", "sz": "2", "side": "A", "time": 2}
        ]))
        .unwrap();
        assert_eq!(batch.coin, "ETH");
        assert_eq!(batch.trades.len(), 2);
        assert!(TradeBatch::from_value(&json!([])).is_none());
        assert!(TradeBatch::from_value(&json!({"coin": "ETH"})).is_none());
    }

    #[test]
    fn time_utc_converts_millis() {
        let t = Trade::from_value_at(&json!({"time": 1_000}), 0);
        assert_eq!(t.time_utc().unwrap().timestamp(), 1);
    }
}
