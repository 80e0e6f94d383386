//! Traits and interfaces for site-agnostic page fetching

use async_trait::async_trait;

use crate::error::Result;

/// Default browser-like user agent, to avoid trivial blocking
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Raw result of one HTTP GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can GET a listing page
///
/// Implementations give up after their configured timeout and report it as
/// [`crate::ScrapeError::Fetch`]. Retries, if any, happen inside `get`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the status code with the body.
    ///
    /// A non-2xx status is a valid response here; the caller decides what
    /// it means.
    async fn get(&self, url: &str) -> Result<FetchResponse>;

    /// Get the user agent string sent with requests
    fn user_agent(&self) -> &str {
        DEFAULT_USER_AGENT
    }
}
