//! reqwest-backed page fetcher

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::traits::{DEFAULT_USER_AGENT, FetchResponse, PageFetcher};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP fetcher with an independent timeout per request
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default user agent and timeout
    pub fn new() -> Result<Self> {
        Self::with_settings(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT)
    }

    pub fn with_settings(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                e.to_string()
            };
            ScrapeError::fetch(url, message)
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::fetch(url, format!("failed to read body: {e}")))?;

        debug!(%url, status, bytes = body.len(), "Fetched page");
        Ok(FetchResponse { status, body })
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Clone for HttpFetcher {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_settings() {
        let fetcher = HttpFetcher::with_settings("test-agent/1.0", Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.user_agent(), "test-agent/1.0");
        assert_eq!(fetcher.timeout(), Duration::from_secs(5));

        let default = HttpFetcher::new().unwrap();
        assert_eq!(default.user_agent(), DEFAULT_USER_AGENT);
        assert_eq!(default.timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let fetcher = HttpFetcher::with_settings("test-agent/1.0", Duration::from_secs(2)).unwrap();
        let err = fetcher.get("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Fetch { .. }));
    }
}
