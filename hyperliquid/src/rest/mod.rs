pub mod endpoints;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{HyperliquidError, Result};

/// HTTP client for the `/info` endpoint.
///
/// Every query is a `POST` of a JSON body tagged with a `type` field.
#[derive(Debug, Clone)]
pub struct InfoClient {
    client: Client,
    base_url: String,
}

impl InfoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST a query to `/info` and decode the JSON response.
    pub async fn post_info<B, T>(&self, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/info", self.base_url);
        let resp = self.client.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            debug!(status, "info request failed");
            return Err(HyperliquidError::Http {
                status,
                message: body,
            });
        }

        // Transport failures stay `Request`; a body that does not decode is `Json`.
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
