use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::database::Database;
use crate::models::ScrapeSummary;
use crate::orchestrator::ScrapeOrchestrator;
use crate::scraper::SiteScraper;
use crate::status::{RunState, ScrapeStatus};
use crate::traits::PageFetcher;

/// One scheduled pass: load sites, scrape, store what is new.
#[derive(Clone)]
pub struct NewsAggregator {
    orchestrator: Arc<ScrapeOrchestrator>,
    database: Database,
    sites_path: PathBuf,
}

impl NewsAggregator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        database: Database,
        sites_path: PathBuf,
        concurrency: usize,
    ) -> Self {
        let orchestrator =
            ScrapeOrchestrator::new(SiteScraper::new(fetcher), ScrapeStatus::new()).with_concurrency(concurrency);

        Self {
            orchestrator: Arc::new(orchestrator),
            database,
            sites_path,
        }
    }

    /// Handle for pollers; reading it never blocks a run.
    pub fn status(&self) -> ScrapeStatus {
        self.orchestrator.status().clone()
    }

    pub async fn refresh(&self) -> Result<ScrapeSummary> {
        let baseline = self.database.existing_keys().await?;

        let summary = self
            .orchestrator
            .run_from_path(&self.sites_path, Some(&baseline))
            .await?;

        let new_articles: Vec<_> = summary
            .articles
            .iter()
            .filter(|article| !baseline.contains(article.dedup_key()))
            .cloned()
            .collect();
        let saved = self.database.save_articles(&new_articles).await?;

        for (site, message) in summary.errors() {
            warn!(%site, %message, "Site failed this run");
        }

        if saved > 0 {
            let stored = self.database.count().await?;
            info!(saved, stored, total_found = summary.total_found, "Stored new articles");
        } else {
            info!(total_found = summary.total_found, "No new articles found");
        }

        Ok(summary)
    }
}

/// Log the status of the running scrape every `interval` until dropped.
pub fn spawn_status_logger(status: ScrapeStatus, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut last_progress = None;
        loop {
            ticker.tick().await;
            let snapshot = status.snapshot();
            if snapshot.state != RunState::Running || last_progress == Some(snapshot.progress_percent) {
                continue;
            }
            last_progress = Some(snapshot.progress_percent);
            info!(
                progress = snapshot.progress_percent,
                current_site = %snapshot.current_site,
                completed = snapshot.sites_completed,
                total = snapshot.sites_total,
                errors = snapshot.errors.len(),
                "Scrape in progress"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::scraper::testing::MockFetcher;

    const SITES: &str = r#"
- name: daily
  url: https://daily.example.com/
  selectors:
    - container_tag: li
      title: { tag: b }
      link: { tag: a, attribute: href }
"#;

    #[tokio::test]
    async fn test_refresh_stores_only_new_articles() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(SITES.as_bytes()).unwrap();

        let fetcher = Arc::new(MockFetcher::default().page(
            "https://daily.example.com/",
            r#"<ul><li><b>One</b><a href="/1">x</a></li><li><b>Two</b><a href="/2">x</a></li></ul>"#,
        ));
        let database = Database::new("sqlite::memory:").await.unwrap();
        let aggregator = NewsAggregator::new(fetcher, database.clone(), file.path().to_path_buf(), 1);

        let first = aggregator.refresh().await.unwrap();
        assert_eq!(first.total_found, 2);
        assert_eq!(first.new_count, 2);
        assert_eq!(database.count().await.unwrap(), 2);

        let second = aggregator.refresh().await.unwrap();
        assert_eq!(second.total_found, 2);
        assert_eq!(second.new_count, 0);
        assert_eq!(database.count().await.unwrap(), 2);
        assert_eq!(aggregator.status().state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_refresh_with_missing_sites_file_fails() {
        let database = Database::new("sqlite::memory:").await.unwrap();
        let aggregator = NewsAggregator::new(
            Arc::new(MockFetcher::default()),
            database,
            PathBuf::from("/nonexistent/sites.yaml"),
            1,
        );

        assert!(aggregator.refresh().await.is_err());
        assert_eq!(aggregator.status().state(), RunState::Failed);
    }
}
