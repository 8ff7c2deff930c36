use url::Url;

use crate::error::{HyperliquidError, Result};

/// Mainnet REST base URL.
pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
/// Mainnet WebSocket URL.
pub const MAINNET_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
/// Testnet REST base URL.
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";
/// Testnet WebSocket URL.
pub const TESTNET_WS_URL: &str = "wss://api.hyperliquid-testnet.xyz/ws";

/// Endpoints for the Hyperliquid info API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperliquidConfig {
    /// Base URL for REST calls; `/info` is appended per request.
    pub api_url: String,
    /// WebSocket URL for push subscriptions.
    pub ws_url: String,
}

impl HyperliquidConfig {
    pub fn mainnet() -> Self {
        Self {
            api_url: MAINNET_API_URL.into(),
            ws_url: MAINNET_WS_URL.into(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            api_url: TESTNET_API_URL.into(),
            ws_url: TESTNET_WS_URL.into(),
        }
    }

    /// Check that both endpoints parse and use the expected schemes.
    ///
    /// # Errors
    ///
    /// Returns [`HyperliquidError::Validation`] naming the offending URL.
    pub fn validate(&self) -> Result<()> {
        check_scheme(&self.api_url, &["http", "https"])?;
        check_scheme(&self.ws_url, &["ws", "wss"])?;
        Ok(())
    }
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

fn check_scheme(raw: &str, allowed: &[&str]) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| HyperliquidError::Validation(format!("invalid url {raw:?}: {e}")))?;
    if !allowed.contains(&url.scheme()) {
        return Err(HyperliquidError::Validation(format!(
            "url {raw:?} must use one of {allowed:?}"
        )));
    }
    Ok(())
}
