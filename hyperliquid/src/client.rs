use crate::config::HyperliquidConfig;
use crate::error::Result;
use crate::rest::InfoClient;
use crate::ws::SubscriptionClient;

/// Entry point bundling the REST client with the endpoint configuration.
#[derive(Debug, Clone)]
pub struct Hyperliquid {
    pub config: HyperliquidConfig,
    /// HTTP client for `/info` queries.
    pub info: InfoClient,
}

impl Hyperliquid {
    /// Validate the configuration and build the REST client.
    pub fn new(config: HyperliquidConfig) -> Result<Self> {
        config.validate()?;
        let info = InfoClient::new(&config.api_url);
        Ok(Self { config, info })
    }

    /// Create a WebSocket subscription client for the configured endpoint.
    /// Call [`SubscriptionClient::connect`] to start it.
    pub fn create_subscription_client(&self) -> SubscriptionClient {
        SubscriptionClient::new(self.config.ws_url.clone())
    }
}
