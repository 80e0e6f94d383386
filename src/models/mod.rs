//! Data models for extracted articles and run results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// View label used for sites without alternate listings
pub const DEFAULT_VIEW: &str = "default";

/// One article card extracted from a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub headline: String,
    /// Absolute URL, fragment stripped. Empty when the card had no link.
    pub article_url: String,
    pub publisher: String,
    pub source: String,
    pub view: String,
    pub published_time: Option<String>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Key used for every deduplication pass.
    ///
    /// Cards without a link fall back to their headline so that they do not
    /// all collapse into a single empty-URL record.
    pub fn dedup_key(&self) -> &str {
        if self.article_url.is_empty() {
            &self.headline
        } else {
            &self.article_url
        }
    }

    /// Stable identifier derived from the dedup key
    pub fn id(&self) -> String {
        format!("{:x}", md5::compute(self.dedup_key()))
    }
}

/// A concrete page to fetch for one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTarget {
    pub url: String,
    pub view_label: String,
}

/// Outcome of one site's worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteResult {
    pub site_name: String,
    /// False only when every target of the site failed.
    pub success: bool,
    pub error: Option<String>,
    pub count: usize,
    /// Failures of individual views, kept even when the site succeeded.
    #[serde(default)]
    pub target_errors: Vec<String>,
}

impl SiteResult {
    pub fn skipped(site_name: &str) -> Self {
        Self {
            site_name: site_name.to_string(),
            success: true,
            error: None,
            count: 0,
            target_errors: Vec::new(),
        }
    }
}

/// Aggregated result of one orchestrator run, handed to the persistence sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub articles: Vec<Article>,
    pub total_found: usize,
    pub new_count: usize,
    pub sites_scraped: usize,
    pub sites_failed: usize,
    pub duration_seconds: f64,
    pub site_results: Vec<SiteResult>,
}

impl ScrapeSummary {
    /// `(site, message)` pairs for every failed site
    pub fn errors(&self) -> Vec<(String, String)> {
        self.site_results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.site_name.clone(), e.clone())))
            .collect()
    }
}
