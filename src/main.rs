use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use news_scraper::aggregator::{NewsAggregator, spawn_status_logger};
use news_scraper::cli::Cli;
use news_scraper::database::Database;
use news_scraper::fetch::HttpFetcher;
use news_scraper::traits::DEFAULT_USER_AGENT;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Cli::parse();
    info!(sites = %args.sites.display(), "Starting news scraper");

    let user_agent = args.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let fetcher = HttpFetcher::with_settings(user_agent, args.timeout())?;
    let database = Database::new(&args.database_url).await?;
    let aggregator = NewsAggregator::new(Arc::new(fetcher), database, args.sites.clone(), args.concurrency());

    let _status_logger = spawn_status_logger(aggregator.status(), Duration::from_secs(2));

    if args.once {
        aggregator.refresh().await?;
        return Ok(());
    }

    // Run once immediately
    if let Err(e) = aggregator.refresh().await {
        error!("Error during initial scrape: {}", e);
    }

    let sched = JobScheduler::new().await?;

    let job_aggregator = aggregator.clone();
    sched
        .add(Job::new_async(args.schedule.as_str(), move |_uuid, _l| {
            let aggregator = job_aggregator.clone();
            Box::pin(async move {
                if let Err(e) = aggregator.refresh().await {
                    error!("Error during scheduled scrape: {}", e);
                }
            })
        })?)
        .await?;

    info!(schedule = %args.schedule, "Scheduler started");
    sched.start().await?;

    // Keep the program running
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    }
}
