// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use partlist_scraper::config::{self, Monitor, ScrapeConfig};
use partlist_scraper::logging::{self, LogSettings};
use partlist_scraper::rate_limit::Delay;
use partlist_scraper::session::chromium::ChromiumLauncher;
use partlist_scraper::{sink, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "partlist-scraper",
    about = "Scrape PC build parts lists from listing pages into a CSV",
    version
)]
struct Cli {
    /// First listing page (inclusive)
    #[arg(long, default_value_t = config::DEFAULT_START_PAGE)]
    start: u32,
    /// Last listing page (inclusive)
    #[arg(long, default_value_t = config::DEFAULT_END_PAGE)]
    end: u32,
    /// Concurrent browser sessions
    #[arg(long, short = 'w', default_value_t = config::DEFAULT_WORKERS)]
    workers: usize,

    /// Listing page base URL
    #[arg(long, default_value = config::DEFAULT_BASE_URL)]
    base_url: String,
    /// Listing filter string
    #[arg(long, default_value = config::DEFAULT_FILTER)]
    filter: String,

    /// Output CSV path
    #[arg(long, short, default_value = config::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Chromium binary (else $PARTLIST_CHROMIUM_PATH, else PATH lookup)
    #[arg(long)]
    chromium_path: Option<PathBuf>,
    /// Run browsers without windows
    #[arg(long)]
    headless: bool,
    /// Directory holding per-session browser profiles
    #[arg(long)]
    profile_root: Option<PathBuf>,
    /// Monitor width used to tile session windows
    #[arg(long, default_value_t = config::DEFAULT_MONITOR_WIDTH)]
    monitor_width: u32,
    /// Monitor height used to tile session windows
    #[arg(long, default_value_t = config::DEFAULT_MONITOR_HEIGHT)]
    monitor_height: u32,

    /// Seconds to wait for listing cards
    #[arg(long, default_value_t = config::DEFAULT_WAIT_SECS)]
    listing_timeout: u64,
    /// Seconds to wait for a build's parts table
    #[arg(long, default_value_t = config::DEFAULT_WAIT_SECS)]
    detail_timeout: u64,
    /// Upper bound in seconds on one page job
    #[arg(long, default_value_t = config::DEFAULT_JOB_DEADLINE_SECS)]
    job_deadline: u64,

    /// Minimum seconds between page jobs on one worker
    #[arg(long, default_value_t = 5.0)]
    page_delay_min: f64,
    /// Maximum seconds between page jobs on one worker
    #[arg(long, default_value_t = 10.0)]
    page_delay_max: f64,
    /// Minimum seconds between builds
    #[arg(long, default_value_t = 3.0)]
    build_delay_min: f64,
    /// Maximum seconds between builds
    #[arg(long, default_value_t = 7.0)]
    build_delay_max: f64,

    /// Log file (rotated on startup and by size)
    #[arg(long, default_value = config::DEFAULT_LOG_FILE)]
    log_file: PathBuf,
    /// Rotate the log file at this many bytes
    #[arg(long, default_value_t = config::DEFAULT_LOG_MAX_BYTES)]
    log_max_bytes: u64,
    /// Rotated log files to keep
    #[arg(long, default_value_t = config::DEFAULT_LOG_ROTATIONS)]
    log_rotations: u32,
    /// Write the log file as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn scrape_config(&self) -> ScrapeConfig {
        let defaults = ScrapeConfig::default();
        ScrapeConfig {
            base_url: self.base_url.clone(),
            filter: self.filter.clone(),
            start_page: self.start,
            end_page: self.end,
            workers: self.workers,
            monitor: Monitor {
                width: self.monitor_width,
                height: self.monitor_height,
            },
            headless: self.headless,
            chromium_path: self.chromium_path.clone(),
            profile_root: self.profile_root.clone().unwrap_or(defaults.profile_root),
            listing_timeout: Duration::from_secs(self.listing_timeout),
            detail_timeout: Duration::from_secs(self.detail_timeout),
            page_delay: Delay::from_secs_f64(self.page_delay_min, self.page_delay_max),
            build_delay: Delay::from_secs_f64(self.build_delay_min, self.build_delay_max),
            job_deadline: Duration::from_secs(self.job_deadline),
            output: self.output.clone(),
        }
    }

    fn log_settings(&self) -> LogSettings {
        LogSettings {
            file: self.log_file.clone(),
            max_bytes: self.log_max_bytes,
            rotations: self.log_rotations,
            json: self.log_json,
            verbose: self.verbose,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli.scrape_config();
    config.validate().context("invalid arguments")?;
    logging::init(&cli.log_settings()).context("failed to set up logging")?;

    info!("starting partlist-scraper v{}", env!("CARGO_PKG_VERSION"));
    info!(
        start = config.start_page,
        end = config.end_page,
        workers = config.pool_size(),
        output = %config.output.display(),
        "configuration loaded"
    );

    let config = Arc::new(config);
    let launcher = Arc::new(ChromiumLauncher::new(&config));
    let report = Scheduler::new(Arc::clone(&config), launcher).run().await;

    let written = sink::write_csv(&config.output, &report.builds)
        .with_context(|| format!("failed to write {}", config.output.display()))?;
    info!(
        builds = written,
        failed_pages = report.failed_jobs(),
        path = %config.output.display(),
        "Done! Saved {written} builds."
    );

    if cli.json {
        let summary = serde_json::json!({
            "builds": written,
            "output": config.output.display().to_string(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Saved {written} builds from {} pages ({} failed) to {}",
            report.jobs.len(),
            report.failed_jobs(),
            config.output.display()
        );
    }

    Ok(())
}
