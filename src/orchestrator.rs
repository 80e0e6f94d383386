//! Runs every enabled site, merges and deduplicates the results.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Instant;

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};

use crate::config::{SiteConfig, load_sites, validate_sites};
use crate::error::{Result, ScrapeError};
use crate::models::{Article, ScrapeSummary, SiteResult};
use crate::scraper::SiteScraper;
use crate::status::ScrapeStatus;

/// Upper bound on concurrently scraped sites.
pub const MAX_CONCURRENCY: usize = 5;

pub struct ScrapeOrchestrator {
    scraper: SiteScraper,
    status: ScrapeStatus,
    concurrency: usize,
}

impl ScrapeOrchestrator {
    /// Sequential orchestrator reporting into `status`
    pub fn new(scraper: SiteScraper, status: ScrapeStatus) -> Self {
        Self {
            scraper,
            status,
            concurrency: 1,
        }
    }

    /// Scrape up to `concurrency` sites at once, clamped to `1..=MAX_CONCURRENCY`.
    ///
    /// With more than one slot, article order and `per_site_stats` order
    /// follow completion order rather than configuration order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn status(&self) -> &ScrapeStatus {
        &self.status
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Load the site list from `path` and run it.
    ///
    /// A list that cannot be read or validated fails the run.
    pub async fn run_from_path(&self, path: &Path, baseline: Option<&HashSet<String>>) -> Result<ScrapeSummary> {
        match load_sites(path).await {
            Ok(sites) => self.run(&sites, baseline).await,
            Err(e) => {
                self.fail_run(&e)?;
                Err(e)
            }
        }
    }

    /// Scrape every enabled site once.
    ///
    /// `baseline` holds dedup keys the caller already has; articles outside
    /// it are counted in `new_count`. Per-site failures end up in the
    /// summary and the status, never in the returned error.
    #[instrument(level = "info", skip_all, fields(sites = configs.len()))]
    pub async fn run(&self, configs: &[SiteConfig], baseline: Option<&HashSet<String>>) -> Result<ScrapeSummary> {
        let started = Instant::now();

        if let Err(e) = validate_sites(configs) {
            self.fail_run(&e)?;
            return Err(e);
        }

        let enabled: Vec<SiteConfig> = configs.iter().filter(|site| site.enabled).cloned().collect();
        self.status.begin(enabled.len())?;
        info!(
            enabled = enabled.len(),
            disabled = configs.len() - enabled.len(),
            concurrency = self.concurrency,
            user_agent = self.scraper.user_agent(),
            "Scrape run started"
        );

        // Each worker owns its site and handles so the run future stays Send.
        let scraper = self.scraper.clone();
        let status = self.status.clone();
        let mut workers = stream::iter(enabled)
            .map(move |site| {
                let scraper = scraper.clone();
                let status = status.clone();
                async move {
                    let name = site.name.clone();
                    let outcome = AssertUnwindSafe(async move { scraper.scrape_site(&site, &status).await })
                        .catch_unwind()
                        .await;
                    (name, outcome)
                }
            })
            .buffer_unordered(self.concurrency);

        // Fresh per run, so back-to-back runs never share dedup state.
        let mut seen: HashSet<String> = HashSet::new();
        let mut articles: Vec<Article> = Vec::new();
        let mut site_results: Vec<SiteResult> = Vec::new();

        while let Some((site, outcome)) = workers.next().await {
            let Ok((found, result)) = outcome else {
                error!(%site, "Site worker panicked, aborting run");
                let err = ScrapeError::WorkerPanicked { site };
                self.status.fail(&err.to_string());
                return Err(err);
            };

            let before = articles.len();
            for article in found {
                if seen.insert(article.dedup_key().to_string()) {
                    articles.push(article);
                }
            }
            let duplicates = result.count - (articles.len() - before);
            if duplicates > 0 {
                info!(%site, duplicates, "Dropped articles already seen this run");
            }
            site_results.push(result);
        }

        let total_found = articles.len();
        let new_count = match baseline {
            Some(known) => articles
                .iter()
                .filter(|article| !known.contains(article.dedup_key()))
                .count(),
            None => total_found,
        };
        let sites_failed = site_results.iter().filter(|result| !result.success).count();

        self.status.complete();

        let summary = ScrapeSummary {
            articles,
            total_found,
            new_count,
            sites_scraped: site_results.len(),
            sites_failed,
            duration_seconds: started.elapsed().as_secs_f64(),
            site_results,
        };

        if sites_failed > 0 {
            warn!(sites_failed, "Some sites failed during the run");
        }
        info!(
            total_found = summary.total_found,
            new_count = summary.new_count,
            sites_scraped = summary.sites_scraped,
            sites_failed = summary.sites_failed,
            secs = summary.duration_seconds,
            "Scrape run completed"
        );

        Ok(summary)
    }

    /// Mark the run FAILED unless another run currently owns the status.
    fn fail_run(&self, err: &ScrapeError) -> Result<()> {
        self.status.fail_unless_running(&err.to_string())?;
        error!(error = %err, "Scrape run failed");
        Ok(())
    }
}
