//! Per-site scrape worker.
//!
//! Fetches every target of one site, runs the extractor on each page and
//! merges the results. A failing view never aborts the remaining views, and a
//! failing site never escapes as an error: it becomes a [`SiteResult`].

pub mod extract;
pub mod views;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::SiteConfig;
use crate::error::{Result, ScrapeError};
use crate::models::{Article, FetchTarget, SiteResult};
use crate::status::ScrapeStatus;
use crate::traits::PageFetcher;

pub use extract::{Extraction, extract, extract_html};
pub use views::resolve_targets;

pub struct SiteScraper {
    fetcher: Arc<dyn PageFetcher>,
}

impl SiteScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn user_agent(&self) -> &str {
        self.fetcher.user_agent()
    }

    /// Scrape all views of one site and report it to `status`.
    ///
    /// Disabled sites return immediately without touching the network or
    /// the status.
    #[instrument(level = "info", skip_all, fields(site = %config.name))]
    pub async fn scrape_site(&self, config: &SiteConfig, status: &ScrapeStatus) -> (Vec<Article>, SiteResult) {
        if !config.enabled {
            debug!("Site disabled, skipping");
            return (Vec::new(), SiteResult::skipped(&config.name));
        }

        status.set_current_site(&config.name);
        let targets = resolve_targets(config);

        let mut articles = Vec::new();
        let mut seen = HashSet::new();
        let mut target_errors = Vec::new();

        for target in &targets {
            match self.scrape_target(config, target).await {
                Ok(found) => {
                    let before = articles.len();
                    for article in found {
                        if seen.insert(article.dedup_key().to_string()) {
                            articles.push(article);
                        }
                    }
                    info!(
                        view = %target.view_label,
                        count = articles.len() - before,
                        "Scraped view"
                    );
                }
                Err(e) => {
                    warn!(view = %target.view_label, url = %target.url, error = %e, "View failed");
                    target_errors.push(format!("view '{}': {e}", target.view_label));
                }
            }
        }

        let all_failed = targets.is_empty() || target_errors.len() == targets.len();
        let error = all_failed.then(|| {
            if target_errors.is_empty() {
                "no fetch targets configured".to_string()
            } else {
                target_errors.join("; ")
            }
        });

        if let Some(message) = &error {
            error!(error = %message, "Every view failed");
        } else {
            info!(count = articles.len(), views = targets.len(), "Site scraped");
        }

        let result = SiteResult {
            site_name: config.name.clone(),
            success: !all_failed,
            error,
            count: articles.len(),
            target_errors,
        };
        status.record_site(&result);

        (articles, result)
    }

    /// Fetch and extract one target, tagging articles with their provenance.
    async fn scrape_target(&self, config: &SiteConfig, target: &FetchTarget) -> Result<Vec<Article>> {
        let page_url = Url::parse(&target.url)
            .map_err(|e| ScrapeError::fetch(&target.url, format!("invalid url: {e}")))?;

        let response = self.fetcher.get(&target.url).await?;
        if !response.is_success() {
            return Err(ScrapeError::fetch(&target.url, format!("HTTP {}", response.status)));
        }

        let extraction = extract_html(&response.body, &config.selectors, &page_url)?;
        if extraction.dropped > 0 {
            debug!(
                view = %target.view_label,
                dropped = extraction.dropped,
                "Dropped containers without headline"
            );
        }

        Ok(extraction
            .articles
            .into_iter()
            .map(|mut article| {
                article.source = config.name.clone();
                article.view = target.view_label.clone();
                article
            })
            .collect())
    }
}

impl Clone for SiteScraper {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher shared by the unit tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{Result, ScrapeError};
    use crate::traits::{FetchResponse, PageFetcher};

    #[derive(Default)]
    pub struct MockFetcher {
        pages: HashMap<String, std::result::Result<FetchResponse, String>>,
        pub requested: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(FetchResponse::ok(body)));
            self
        }

        pub fn status(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(
                url.to_string(),
                Ok(FetchResponse {
                    status,
                    body: String::new(),
                }),
            );
            self
        }

        pub fn failure(mut self, url: &str, message: &str) -> Self {
            self.pages.insert(url.to_string(), Err(message.to_string()));
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn get(&self, url: &str) -> Result<FetchResponse> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(message)) => Err(ScrapeError::fetch(url, message.clone())),
                None => Err(ScrapeError::fetch(url, "connection refused")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockFetcher;
    use super::*;
    use crate::config::{FieldRule, SelectorRule, ViewConfig};
    use crate::status::RunState;

    fn cards(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, href)| format!(r#"<div class="card"><h3>{title}</h3><a href="{href}">more</a></div>"#))
            .collect();
        format!("<html><body>{body}</body></html>")
    }

    fn site(name: &str, views: &[(&str, &str)]) -> SiteConfig {
        SiteConfig {
            name: name.to_string(),
            url: format!("https://{name}.example.com/"),
            multi_view: !views.is_empty(),
            views: views
                .iter()
                .map(|(label, suffix)| ViewConfig {
                    label: label.to_string(),
                    suffix: suffix.to_string(),
                })
                .collect(),
            selectors: vec![SelectorRule {
                title: Some(FieldRule::new("h3")),
                link: Some(FieldRule::new("a").with_attribute("href")),
                ..SelectorRule::new("div", Some("card"))
            }],
            language: None,
            country: None,
            category: None,
            enabled: true,
        }
    }

    fn running_status() -> ScrapeStatus {
        let status = ScrapeStatus::new();
        status.begin(1).unwrap();
        status
    }

    #[test]
    fn test_user_agent_comes_from_fetcher() {
        let scraper = SiteScraper::new(Arc::new(MockFetcher::default()));
        assert_eq!(scraper.user_agent(), crate::traits::DEFAULT_USER_AGENT);

        let http = crate::fetch::HttpFetcher::with_settings("news-bot/2.0", std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(SiteScraper::new(Arc::new(http)).user_agent(), "news-bot/2.0");
    }

    #[tokio::test]
    async fn test_disabled_site_makes_no_requests() {
        let fetcher = Arc::new(MockFetcher::default());
        let scraper = SiteScraper::new(fetcher.clone());
        let mut config = site("off", &[]);
        config.enabled = false;

        let status = running_status();
        let (articles, result) = scraper.scrape_site(&config, &status).await;
        assert!(articles.is_empty());
        assert!(result.success);
        assert_eq!(result.count, 0);
        assert!(fetcher.requests().is_empty());
        assert_eq!(status.snapshot().sites_completed, 0);
    }

    #[tokio::test]
    async fn test_views_are_merged_first_seen_wins() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(
                    "https://multi.example.com/",
                    &cards(&[("Shared one", "/a"), ("Shared two", "/b"), ("Top only", "/c")]),
                )
                .page(
                    "https://multi.example.com/?type=latest",
                    &cards(&[("Shared one", "/a"), ("Shared two", "/b"), ("Latest only", "/d")]),
                ),
        );
        let scraper = SiteScraper::new(fetcher.clone());
        let config = site("multi", &[("top", ""), ("latest", "?type=latest")]);

        let status = running_status();
        let (articles, result) = scraper.scrape_site(&config, &status).await;
        assert_eq!(result.count, 4);
        assert!(result.success);
        assert_eq!(articles[0].view, "top");
        assert_eq!(articles[1].view, "top");
        assert_eq!(articles[3].headline, "Latest only");
        assert_eq!(articles[3].view, "latest");
        assert!(articles.iter().all(|a| a.source == "multi"));
        assert_eq!(
            fetcher.requests(),
            ["https://multi.example.com/", "https://multi.example.com/?type=latest"]
        );
        assert_eq!(status.snapshot().articles_for("multi"), Some(4));
    }

    #[tokio::test]
    async fn test_partial_view_failure_is_not_site_failure() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .status("https://part.example.com/", 503)
                .page("https://part.example.com/latest", &cards(&[("Only", "/x")])),
        );
        let scraper = SiteScraper::new(fetcher);
        let config = site("part", &[("top", ""), ("latest", "latest")]);

        let status = running_status();
        let (articles, result) = scraper.scrape_site(&config, &status).await;
        assert_eq!(articles.len(), 1);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.target_errors.len(), 1);
        assert!(result.target_errors[0].contains("HTTP 503"));
        assert!(status.snapshot().errors.is_empty());
    }

    #[tokio::test]
    async fn test_total_failure_is_reported_once() {
        let fetcher = Arc::new(
            MockFetcher::default()
                .failure("https://down.example.com/", "timed out after 20s")
                .page("https://down.example.com/b", "<html><body><p>nothing</p></body></html>"),
        );
        let scraper = SiteScraper::new(fetcher);
        let config = site("down", &[("a", ""), ("b", "b")]);

        let status = running_status();
        let (articles, result) = scraper.scrape_site(&config, &status).await;
        assert!(articles.is_empty());
        assert!(!result.success);
        let message = result.error.unwrap();
        assert!(message.contains("timed out"));
        assert!(message.contains("no article containers"));

        let snap = status.snapshot();
        assert_eq!(snap.state, RunState::Running);
        assert_eq!(snap.sites_completed, 1);
        assert_eq!(snap.errors.len(), 1);
        assert_eq!(snap.errors[0].site, "down");
        assert_eq!(snap.articles_for("down"), Some(0));
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_an_error() {
        let html = r#"<html><body><div class="card"><h3></h3></div></body></html>"#;
        let fetcher = Arc::new(MockFetcher::default().page("https://quiet.example.com/", html));
        let scraper = SiteScraper::new(fetcher);

        let status = running_status();
        let (articles, result) = scraper.scrape_site(&site("quiet", &[]), &status).await;
        assert!(articles.is_empty());
        assert!(result.success);
        assert!(result.error.is_none());
        assert!(status.snapshot().errors.is_empty());
    }
}
