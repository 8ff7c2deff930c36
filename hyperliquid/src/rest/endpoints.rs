use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use crate::error::Result;
use crate::rest::InfoClient;
use crate::types::*;

impl InfoClient {
    // --- Markets ---

    /// `{"type":"meta"}` - perpetual universe.
    pub async fn meta(&self) -> Result<Meta> {
        self.post_info(&json!({ "type": "meta" })).await
    }

    /// Pair labels for every listed market, in exchange order.
    pub async fn markets(&self) -> Result<Vec<String>> {
        Ok(self.meta().await?.pair_labels())
    }

    // --- Order book ---

    /// `{"type":"l2Book","coin":..}` - aggregated L2 snapshot.
    pub async fn l2_book(&self, coin: &str) -> Result<L2Book> {
        self.post_info(&json!({ "type": "l2Book", "coin": coin }))
            .await
    }

    // --- Trades ---

    /// `{"type":"recentTrades","req":{"coin":..,"n":..}}` - most recent
    /// trades, normalized. A non-array response yields an empty list.
    pub async fn recent_trades(&self, coin: &str, n: usize) -> Result<Vec<Trade>> {
        let raw: Value = self
            .post_info(&json!({
                "type": "recentTrades",
                "req": { "coin": coin, "n": n },
            }))
            .await?;
        Ok(raw
            .as_array()
            .map(|items| items.iter().map(Trade::from_value).collect())
            .unwrap_or_default())
    }

    // --- Candles ---

    /// `{"type":"candleSnapshot","req":{..}}` - candles in `[start_ms, end_ms]`.
    pub async fn candle_snapshot(
        &self,
        coin: &str,
        interval: CandleInterval,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<Candle>> {
        self.post_info(&json!({
            "type": "candleSnapshot",
            "req": {
                "coin": coin,
                "interval": interval,
                "startTime": start_ms,
                "endTime": end_ms,
            },
        }))
        .await
    }

    /// The last `limit` candles ending now.
    pub async fn candles(
        &self,
        coin: &str,
        interval: CandleInterval,
        limit: u64,
    ) -> Result<Vec<Candle>> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let (start, end) = candle_window(interval, limit, now);
        self.candle_snapshot(coin, interval, start, end).await
    }
}
