use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One price level as delivered by the exchange.
///
/// Price and size stay in their wire form (decimal strings). Consumers
/// parse them and decide what to do with values that do not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLevel {
    #[serde(default, deserialize_with = "lenient_string")]
    pub px: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sz: String,
    /// Number of resting orders at this price.
    #[serde(default)]
    pub n: u32,
}

impl RawLevel {
    pub fn new(px: impl Into<String>, sz: impl Into<String>, n: u32) -> Self {
        Self {
            px: px.into(),
            sz: sz.into(),
            n,
        }
    }
}

/// L2 book snapshot, used for both the REST response and push updates.
///
/// `levels[0]` holds bids and `levels[1]` asks. Either side may be
/// missing on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Book {
    #[serde(default)]
    pub coin: String,
    /// Exchange timestamp in epoch milliseconds.
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub levels: Vec<Vec<RawLevel>>,
}

impl L2Book {
    pub fn new(coin: impl Into<String>, bids: Vec<RawLevel>, asks: Vec<RawLevel>) -> Self {
        Self {
            coin: coin.into(),
            time: 0,
            levels: vec![bids, asks],
        }
    }

    pub fn bids(&self) -> &[RawLevel] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn asks(&self) -> &[RawLevel] {
        self.levels.get(1).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Accept strings and numbers; anything else becomes an empty string so
/// that the level is later treated as malformed instead of failing the
/// whole book.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
