// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run configuration.
//!
//! A single `ScrapeConfig` is built at startup and shared by reference with
//! every worker. Nothing in the pipeline reads global state.

use crate::error::{Result, ScrapeError};
use crate::rate_limit::Delay;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://pcpartpicker.com/builds/";
/// Listing filter string embedded in every listing URL.
pub const DEFAULT_FILTER: &str = "33,41,39,40,42,28,35,36,38";
pub const DEFAULT_START_PAGE: u32 = 1;
pub const DEFAULT_END_PAGE: u32 = 70;
pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_MONITOR_WIDTH: u32 = 2560;
pub const DEFAULT_MONITOR_HEIGHT: u32 = 1440;
pub const DEFAULT_WAIT_SECS: u64 = 30;
pub const DEFAULT_JOB_DEADLINE_SECS: u64 = 30 * 60;
pub const DEFAULT_OUTPUT: &str = "parsed_builds.csv";
pub const DEFAULT_LOG_FILE: &str = "scraper.log";
pub const DEFAULT_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_LOG_ROTATIONS: u32 = 5;

/// Environment variable consulted for the Chromium binary.
pub const CHROMIUM_PATH_ENV: &str = "PARTLIST_CHROMIUM_PATH";

/// Physical screen the session windows are tiled across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub width: u32,
    pub height: u32,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            width: DEFAULT_MONITOR_WIDTH,
            height: DEFAULT_MONITOR_HEIGHT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub filter: String,
    pub start_page: u32,
    pub end_page: u32,
    pub workers: usize,
    pub monitor: Monitor,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    /// Parent directory of every per-session browser profile.
    pub profile_root: PathBuf,
    pub listing_timeout: Duration,
    pub detail_timeout: Duration,
    pub page_delay: Delay,
    pub build_delay: Delay,
    /// Upper bound on one page job, session launch to teardown.
    pub job_deadline: Duration,
    pub output: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            filter: DEFAULT_FILTER.to_string(),
            start_page: DEFAULT_START_PAGE,
            end_page: DEFAULT_END_PAGE,
            workers: DEFAULT_WORKERS,
            monitor: Monitor::default(),
            headless: false,
            chromium_path: None,
            profile_root: default_profile_root(),
            listing_timeout: Duration::from_secs(DEFAULT_WAIT_SECS),
            detail_timeout: Duration::from_secs(DEFAULT_WAIT_SECS),
            page_delay: Delay::from_secs_f64(5.0, 10.0),
            build_delay: Delay::from_secs_f64(3.0, 7.0),
            job_deadline: Duration::from_secs(DEFAULT_JOB_DEADLINE_SECS),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl ScrapeConfig {
    /// URL of one listing page.
    pub fn listing_url(&self, page: u32) -> String {
        format!("{}#s={}&page={}", self.base_url, self.filter, page)
    }

    /// Worker count, never below one.
    pub fn pool_size(&self) -> usize {
        self.workers.max(1)
    }

    /// Reject settings that would make every wait fail instantly.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ScrapeError::Config("base URL is empty".to_string()));
        }
        if self.listing_timeout.is_zero() || self.detail_timeout.is_zero() {
            return Err(ScrapeError::Config(
                "wait timeouts must be greater than zero".to_string(),
            ));
        }
        if self.job_deadline.is_zero() {
            return Err(ScrapeError::Config(
                "job deadline must be greater than zero".to_string(),
            ));
        }
        if self.monitor.width < 2 || self.monitor.height < 2 {
            return Err(ScrapeError::Config(format!(
                "monitor {}x{} is too small to tile",
                self.monitor.width, self.monitor.height
            )));
        }
        Ok(())
    }
}

/// `<cache>/partlist-scraper/profiles`, or the temp dir without a cache dir.
pub fn default_profile_root() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("partlist-scraper").join("profiles"))
        .unwrap_or_else(|| std::env::temp_dir().join("partlist-scraper-profiles"))
}

pub(crate) fn read_env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
