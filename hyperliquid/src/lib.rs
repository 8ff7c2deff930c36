pub mod client;
pub mod config;
pub mod error;
pub mod rest;
pub mod types;
pub mod ws;

// ---- Top-level re-exports for ergonomic usage ----

pub use client::Hyperliquid;
pub use config::HyperliquidConfig;
pub use error::{HyperliquidError, Result};

// REST client
pub use rest::InfoClient;

// Market metadata
pub use types::{coin_from_label, pair_label, AssetMeta, Meta, QUOTE_SUFFIX};

// Order book
pub use types::{L2Book, RawLevel};

// Trades
pub use types::{parse_decimal, TakerSide, Trade, TradeBatch};

// Candles
pub use types::{candle_window, Candle, CandleInterval, DEFAULT_CANDLE_LIMIT};

// WebSocket
pub use ws::events::{parse_frame, SubscriptionKey, WsEvent};
pub use ws::subscriber::{BookSubscription, CandleSubscription, TradeSubscription};
pub use ws::SubscriptionClient;
