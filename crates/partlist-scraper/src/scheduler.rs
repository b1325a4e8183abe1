// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page-job scheduling: bounded fan-out across browser sessions, fan-in of
//! accepted builds.
//!
//! Each listing page becomes one [`PageJob`]. At most `workers` jobs run at a
//! time, each on its own tokio task with its own session; a job runs its
//! page strictly in order (list links, then extract each build). Results are
//! collected as jobs finish, in completion order. A failing, panicking or
//! overrunning job is recorded and never affects any other job.

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::extractor::{self, BuildOutcome};
use crate::model::{Build, PageJob};
use crate::navigator;
use crate::session::{profile, BrowserSession, SessionLauncher};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// One job per page in `start..=end`, slots assigned `i % pool_size` in
/// submission order.
pub fn plan_jobs(start: u32, end: u32, pool_size: usize) -> Vec<PageJob> {
    let pool_size = pool_size.max(1);
    (start..=end)
        .enumerate()
        .map(|(i, page)| PageJob {
            page,
            slot: i % pool_size,
        })
        .collect()
}

/// Counters for one completed page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub links: usize,
    pub skipped_cards: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Accepted builds of one page.
#[derive(Debug, Default)]
pub struct PageResult {
    pub builds: Vec<Build>,
    pub stats: PageStats,
}

/// Why a page job produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    #[error("session init failed: {0}")]
    SessionInit(ScrapeError),

    #[error("listing failed: {0}")]
    Listing(ScrapeError),

    #[error("job exceeded its {}s deadline", .0.as_secs())]
    Deadline(Duration),

    #[error("job panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Completed { stats: PageStats },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub page: u32,
    pub slot: usize,
    #[serde(flatten)]
    pub status: JobStatus,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stale_profiles_removed: usize,
    /// Per-job outcomes in completion order.
    pub jobs: Vec<JobReport>,
    /// Accepted builds in arrival order.
    #[serde(skip)]
    pub builds: Vec<Build>,
}

impl RunReport {
    pub fn total_builds(&self) -> usize {
        self.builds.len()
    }

    pub fn failed_jobs(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Failed { .. }))
            .count()
    }
}

/// Drives page jobs across a bounded pool of sessions.
pub struct Scheduler {
    config: Arc<ScrapeConfig>,
    launcher: Arc<dyn SessionLauncher>,
}

impl Scheduler {
    pub fn new(config: Arc<ScrapeConfig>, launcher: Arc<dyn SessionLauncher>) -> Self {
        Self { config, launcher }
    }

    /// Clean stale profiles, then scrape the configured page range.
    pub async fn run(&self) -> RunReport {
        let removed = profile::clean_stale(&self.config.profile_root);
        let jobs = plan_jobs(
            self.config.start_page,
            self.config.end_page,
            self.config.pool_size(),
        );
        if jobs.is_empty() {
            warn!(
                start = self.config.start_page,
                end = self.config.end_page,
                "empty page range, nothing to scrape"
            );
        }
        let mut report = self.run_jobs(jobs).await;
        report.stale_profiles_removed = removed;
        report
    }

    /// Run `jobs` with at most `pool_size` in flight; returns once all finish.
    pub async fn run_jobs(&self, jobs: Vec<PageJob>) -> RunReport {
        let started_at = Utc::now();
        let pool_size = self.config.pool_size();
        info!(jobs = jobs.len(), workers = pool_size, "starting scrape");

        let mut completions = stream::iter(jobs)
            .map(|job| {
                let config = Arc::clone(&self.config);
                let launcher = Arc::clone(&self.launcher);
                async move {
                    let joined = tokio::spawn(run_job(config, launcher, job)).await;
                    let outcome = joined.unwrap_or_else(|e| Err(JobFailure::Panicked(panic_reason(e))));
                    (job, outcome)
                }
            })
            .buffer_unordered(pool_size);

        let mut builds = Vec::new();
        let mut reports = Vec::new();

        while let Some((job, outcome)) = completions.next().await {
            let status = match outcome {
                Ok(page) => {
                    info!(
                        page = job.page,
                        slot = job.slot,
                        accepted = page.stats.accepted,
                        rejected = page.stats.rejected,
                        failed = page.stats.failed,
                        "page complete"
                    );
                    builds.extend(page.builds);
                    JobStatus::Completed { stats: page.stats }
                }
                Err(failure) => {
                    error!(page = job.page, slot = job.slot, reason = %failure, "page failed");
                    JobStatus::Failed {
                        reason: failure.to_string(),
                    }
                }
            };
            reports.push(JobReport {
                page: job.page,
                slot: job.slot,
                status,
            });
        }

        RunReport {
            started_at,
            finished_at: Utc::now(),
            stale_profiles_removed: 0,
            jobs: reports,
            builds,
        }
    }
}

async fn run_job(
    config: Arc<ScrapeConfig>,
    launcher: Arc<dyn SessionLauncher>,
    job: PageJob,
) -> Result<PageResult, JobFailure> {
    let deadline = config.job_deadline;
    let result = tokio::time::timeout(deadline, scrape_page(&config, launcher.as_ref(), job))
        .await
        .unwrap_or(Err(JobFailure::Deadline(deadline)));
    // Held inside the job so the next page on this worker waits too.
    config.page_delay.pause().await;
    result
}

/// Scrape one listing page with a fresh session.
///
/// The session is closed on every return path; a teardown failure is logged
/// and does not change the page result.
pub async fn scrape_page(
    config: &ScrapeConfig,
    launcher: &dyn SessionLauncher,
    job: PageJob,
) -> Result<PageResult, JobFailure> {
    info!(page = job.page, slot = job.slot, "processing page");
    let mut session = launcher
        .launch(job.slot)
        .await
        .map_err(JobFailure::SessionInit)?;

    let result = scrape_with_session(config, session.as_mut(), job).await;

    if let Err(e) = session.close().await {
        warn!(page = job.page, "session teardown failed: {e}");
    }
    result
}

async fn scrape_with_session(
    config: &ScrapeConfig,
    session: &mut dyn BrowserSession,
    job: PageJob,
) -> Result<PageResult, JobFailure> {
    let url = config.listing_url(job.page);
    let listing = navigator::list_build_links(session, &url, config.listing_timeout)
        .await
        .map_err(JobFailure::Listing)?;

    let mut result = PageResult {
        builds: Vec::new(),
        stats: PageStats {
            links: listing.links.len(),
            skipped_cards: listing.skipped_cards,
            ..PageStats::default()
        },
    };
    if listing.links.is_empty() {
        info!(page = job.page, "no builds listed");
    }

    for link in &listing.links {
        match extractor::extract_build(session, link, config.detail_timeout).await {
            BuildOutcome::Accepted(build) => {
                info!(page = job.page, url = %build.source, components = build.components.len(), "added build");
                result.builds.push(build);
                result.stats.accepted += 1;
                config.build_delay.pause().await;
            }
            BuildOutcome::Rejected(rejection) => {
                info!(page = job.page, url = %link, reason = %rejection, "discarded build");
                result.stats.rejected += 1;
                config.build_delay.pause().await;
            }
            BuildOutcome::Failed(e) => {
                warn!(page = job.page, url = %link, "failed to process build: {e}");
                result.stats.failed += 1;
            }
        }
    }

    Ok(result)
}

fn panic_reason(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
