//! Configuration-driven news scraper.
//!
//! Sites are described declaratively ([`config::SiteConfig`]): where to fetch
//! listing pages, which views exist, and which selector rules find article
//! cards. [`orchestrator::ScrapeOrchestrator`] runs every enabled site through
//! a [`crate::scraper::SiteScraper`], isolates failures per site, deduplicates by
//! article URL and reports progress through a shared [`status::ScrapeStatus`].

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod scraper;
pub mod status;
pub mod traits;

pub use config::{FieldRule, SelectorRule, SiteConfig, ViewConfig};
pub use error::ScrapeError;
pub use models::{Article, FetchTarget, ScrapeSummary, SiteResult};
pub use orchestrator::ScrapeOrchestrator;
pub use crate::scraper::SiteScraper;
pub use status::{RunState, ScrapeStatus, StatusSnapshot};
pub use traits::{FetchResponse, PageFetcher};
