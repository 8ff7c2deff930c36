use thiserror::Error;

#[derive(Error, Debug)]
pub enum HyperliquidError {
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, HyperliquidError>;
