use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("market not found: {0}")]
    MarketNotFound(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hyperliquid error: {0}")]
    Hyperliquid(#[from] hyperliquid::HyperliquidError),
}
