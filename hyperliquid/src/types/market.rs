use serde::{Deserialize, Serialize};

/// Quote suffix used when presenting a coin as a trading pair.
pub const QUOTE_SUFFIX: &str = "-USDT";

/// Exchange metadata: the perpetual universe in exchange order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

/// A single listed asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    /// Coin name, e.g. `"BTC"`. Some responses label this `coin`.
    #[serde(alias = "coin")]
    pub name: String,
    #[serde(default)]
    pub sz_decimals: u32,
    #[serde(default)]
    pub max_leverage: u32,
    #[serde(default)]
    pub only_isolated: bool,
}

impl Meta {
    /// Pair labels (`"BTC-USDT"`, ...) in exchange order.
    pub fn pair_labels(&self) -> Vec<String> {
        self.universe.iter().map(|a| pair_label(&a.name)).collect()
    }
}

/// Render a coin as a pair label.
pub fn pair_label(coin: &str) -> String {
    format!("{coin}{QUOTE_SUFFIX}")
}

/// Recover the coin from a pair label. Labels without the suffix are
/// returned unchanged.
pub fn coin_from_label(label: &str) -> &str {
    label.strip_suffix(QUOTE_SUFFIX).unwrap_or(label)
}
