//! Error types for the scraper engine.
//!
//! Only [`ScrapeError::Config`], [`ScrapeError::AlreadyRunning`] and
//! [`ScrapeError::WorkerPanicked`] ever escape an orchestrator run. Fetch and
//! parse failures are captured per site and reported through the status.

/// Errors produced while loading sites, fetching pages or running a scrape.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The site list could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(String),

    /// Network failure, timeout or non-2xx response for one target.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The page could not be turned into articles.
    #[error("parse failed for {url}: {message}")]
    Parse { url: String, message: String },

    /// A run was requested while another run still owns the status.
    #[error("a scrape run is already in progress")]
    AlreadyRunning,

    /// A site worker panicked; the run cannot be trusted.
    #[error("worker for site '{site}' panicked")]
    WorkerPanicked { site: String },
}

impl ScrapeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn parse(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
