//! Shared scrape progress, written by the run and polled by a UI.
//!
//! [`ScrapeStatus`] is a cheap clonable handle. Every mutation happens under
//! one write lock and readers only ever get a cloned [`StatusSnapshot`], so a
//! poller never observes `sites_completed` without the matching
//! `per_site_stats` entry.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::models::SiteResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Articles found for one site, in completion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStat {
    pub site: String,
    pub articles: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteError {
    pub site: String,
    pub message: String,
}

/// Point-in-time copy of the run status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: RunState,
    pub progress_percent: u8,
    pub current_site: String,
    pub sites_total: usize,
    pub sites_completed: usize,
    pub per_site_stats: Vec<SiteStat>,
    pub errors: Vec<SiteError>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the run itself failed, as opposed to individual sites.
    pub fatal_error: Option<String>,
}

impl StatusSnapshot {
    pub fn articles_for(&self, site: &str) -> Option<usize> {
        self.per_site_stats
            .iter()
            .find(|stat| stat.site == site)
            .map(|stat| stat.articles)
    }
}

/// Handle to the shared status of scrape runs
#[derive(Debug, Clone, Default)]
pub struct ScrapeStatus {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl ScrapeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StatusSnapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusSnapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.read().clone()
    }

    pub fn state(&self) -> RunState {
        self.read().state
    }

    /// IDLE/COMPLETED/FAILED -> RUNNING, wiping the previous run.
    pub fn begin(&self, sites_total: usize) -> Result<()> {
        let mut status = self.write();
        if status.state == RunState::Running {
            return Err(ScrapeError::AlreadyRunning);
        }
        *status = StatusSnapshot {
            state: RunState::Running,
            sites_total,
            started_at: Some(Utc::now()),
            ..StatusSnapshot::default()
        };
        Ok(())
    }

    pub fn set_current_site(&self, site: &str) {
        self.write().current_site = site.to_string();
    }

    /// Record a finished site: counter, stats, error and progress move together.
    pub fn record_site(&self, result: &SiteResult) {
        let mut status = self.write();
        status.current_site = result.site_name.clone();
        status.sites_completed += 1;

        match status
            .per_site_stats
            .iter_mut()
            .find(|stat| stat.site == result.site_name)
        {
            Some(stat) => stat.articles = result.count,
            None => status.per_site_stats.push(SiteStat {
                site: result.site_name.clone(),
                articles: result.count,
            }),
        }

        if let Some(message) = result.error.as_ref().filter(|_| !result.success) {
            status.errors.push(SiteError {
                site: result.site_name.clone(),
                message: message.clone(),
            });
        }

        // 100 is reserved for the terminal transition.
        let progress = progress_percent(status.sites_completed, status.sites_total).min(99);
        status.progress_percent = status.progress_percent.max(progress);
    }

    /// RUNNING -> COMPLETED
    pub fn complete(&self) {
        let mut status = self.write();
        status.state = RunState::Completed;
        status.progress_percent = 100;
        status.current_site.clear();
        status.completed_at = Some(Utc::now());
    }

    /// RUNNING -> FAILED, or straight to FAILED when the run never started.
    pub fn fail(&self, message: &str) {
        Self::mark_failed(&mut self.write(), message);
    }

    /// Fail a run that never got to `begin`, unless another run is active.
    pub fn fail_unless_running(&self, message: &str) -> Result<()> {
        let mut status = self.write();
        if status.state == RunState::Running {
            return Err(ScrapeError::AlreadyRunning);
        }
        Self::mark_failed(&mut status, message);
        Ok(())
    }

    fn mark_failed(status: &mut StatusSnapshot, message: &str) {
        if status.started_at.is_none() {
            status.started_at = Some(Utc::now());
        }
        status.state = RunState::Failed;
        status.progress_percent = 100;
        status.current_site.clear();
        status.fatal_error = Some(message.to_string());
        status.completed_at = Some(Utc::now());
    }
}

fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (100.0 * completed as f64 / total as f64).round();
    percent.clamp(0.0, 100.0) as u8
}
