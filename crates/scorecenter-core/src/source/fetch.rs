// HTTP transport behind the data source. The ESPN source only needs "GET this
// URL, give me the body", so that is the whole seam.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::DataError;

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` and return the response body as text.
    async fn fetch(&self, url: &str) -> Result<String, DataError>;
}

/// `Fetch` implementation backed by a shared `reqwest::Client`.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::Transport(format!("failed to build http client: {e}")))?;
        Ok(HttpFetcher { http })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, DataError> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| DataError::Transport(format!("failed reading body: {e}")))
    }
}
