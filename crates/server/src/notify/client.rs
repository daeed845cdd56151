//! HTTP push gateway client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, instrument};
use url::Url;

use super::error::TransportError;
use super::{MulticastMessage, NotificationTransport};

/// Per-request budget for gateway calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Push gateway client posting multicast messages as JSON.
#[derive(Clone)]
pub struct HttpPushTransport {
    /// HTTP client.
    client: Client,
    /// Multicast endpoint.
    endpoint: Url,
    /// Bearer key for the gateway.
    api_key: SecretString,
}

impl std::fmt::Debug for HttpPushTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPushTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpPushTransport {
    /// Create a new gateway client with the default request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(endpoint: Url, api_key: SecretString) -> Self {
        Self::with_timeout(endpoint, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a new gateway client whose calls give up after `timeout`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn with_timeout(endpoint: Url, api_key: SecretString, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint,
            api_key,
        }
    }

    /// The configured endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationTransport for HttpPushTransport {
    #[instrument(skip(self, message), fields(tokens = message.tokens.len()))]
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(message)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "Push gateway rejected multicast");
            return Err(TransportError::Api { status, body });
        }

        debug!("Multicast handed to push gateway");
        Ok(())
    }
}
