//! Command-line interface for the news scraper.
//!
//! Every option can also come from the environment (or a `.env` file).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::orchestrator::MAX_CONCURRENCY;

/// Scrape configured news sites on a schedule and store new articles.
///
/// # Examples
///
/// ```sh
/// # One pass, then exit
/// news-scraper --sites sites.yaml --once
///
/// # Every 15 minutes, three sites at a time
/// news-scraper --sites sites.yaml --schedule "0 */15 * * * *" --concurrency 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Site list (YAML or JSON)
    #[arg(short, long, env = "NEWS_SITES_FILE", default_value = "sites.yaml")]
    pub sites: PathBuf,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:database/news.db")]
    pub database_url: String,

    /// Cron expression (with seconds) for scheduled runs
    #[arg(long, env = "SCRAPE_SCHEDULE", default_value = "0 */30 * * * *")]
    pub schedule: String,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Sites scraped at the same time
    #[arg(short, long, env = "SCRAPE_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,

    /// Override the browser User-Agent header
    #[arg(long, env = "SCRAPER_USER_AGENT")]
    pub user_agent: Option<String>,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(1, 120))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["news-scraper", "--sites", "./sites.json"]);

        assert_eq!(cli.sites, PathBuf::from("./sites.json"));
        assert!(!cli.once);
        assert_eq!(cli.timeout(), Duration::from_secs(20));
        assert!(cli.user_agent.is_none());
    }

    #[test]
    fn test_cli_clamps_values() {
        let cli = Cli::parse_from([
            "news-scraper",
            "--once",
            "--concurrency",
            "40",
            "--timeout-secs",
            "0",
        ]);

        assert!(cli.once);
        assert_eq!(cli.concurrency(), MAX_CONCURRENCY);
        assert_eq!(cli.timeout(), Duration::from_secs(1));
    }
}
