//! Health API.

use crate::client::RelayClient;
use crate::error::{Error, Result};
use crate::types::HealthResponse;

/// Health API client.
pub struct HealthApi {
    client: RelayClient,
}

impl HealthApi {
    pub(crate) fn new(client: RelayClient) -> Self {
        Self { client }
    }

    /// Check basic health.
    pub async fn check(&self) -> Result<HealthResponse> {
        // Health lives at the root, not under /proxy
        let inner = self.client.inner();
        let url = inner.base_url.join("health").map_err(Error::from)?;

        let response = inner.http.get(url).timeout(inner.timeout).send().await?;
        self.client.handle_response(response).await
    }

    /// Simple connectivity check.
    pub async fn is_healthy(&self) -> bool {
        self.check().await.is_ok()
    }
}
