//! End-to-end pipeline tests against an in-memory site.
//!
//! `FakeLauncher` hands out sessions that serve canned HTML, so scheduling,
//! retry, discard and teardown rules run exactly as in production without a
//! browser.

use async_trait::async_trait;
use partlist_scraper::config::ScrapeConfig;
use partlist_scraper::error::{Result, ScrapeError};
use partlist_scraper::rate_limit::Delay;
use partlist_scraper::scheduler::{self, JobStatus, RunReport, Scheduler};
use partlist_scraper::session::{BrowserSession, SessionLauncher};
use partlist_scraper::sink;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE: &str = "https://builds.test/";

// ─────────────────────── fake site ───────────────────────

#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    /// Remaining selector-wait timeouts per URL before the page "renders".
    stalls: Mutex<HashMap<String, usize>>,
    /// Remaining navigations per URL that commit but report a timeout.
    slow_loads: Mutex<HashMap<String, usize>>,
    /// Navigating here panics.
    panics: HashSet<String>,
    /// Navigating here never completes.
    hangs: HashSet<String>,
    /// Launch calls that fail, by 0-based launch index.
    failed_launches: HashSet<usize>,

    launches: AtomicUsize,
    closes: AtomicUsize,
    drops: AtomicUsize,
    reloads: AtomicUsize,
    visits: Mutex<Vec<String>>,
}

impl FakeSite {
    fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    fn stall(self, url: &str, times: usize) -> Self {
        self.stalls.lock().unwrap().insert(url.to_string(), times);
        self
    }

    fn slow_load(self, url: &str, times: usize) -> Self {
        self.slow_loads.lock().unwrap().insert(url.to_string(), times);
        self
    }

    fn visits_to(&self, url: &str) -> usize {
        self.visits.lock().unwrap().iter().filter(|v| *v == url).count()
    }
}

struct FakeLauncher {
    site: Arc<FakeSite>,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, _slot: usize) -> Result<Box<dyn BrowserSession>> {
        let n = self.site.launches.fetch_add(1, Ordering::SeqCst);
        if self.site.failed_launches.contains(&n) {
            return Err(ScrapeError::Launch("chromedriver exited".into()));
        }
        Ok(Box::new(FakeSession {
            site: Arc::clone(&self.site),
            current: None,
        }))
    }
}

struct FakeSession {
    site: Arc<FakeSite>,
    current: Option<String>,
}

fn take_one(counts: &Mutex<HashMap<String, usize>>, url: &str) -> bool {
    let mut counts = counts.lock().unwrap();
    match counts.get_mut(url) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

fn selector_matches(html: &str, selector: &str) -> bool {
    let sel = Selector::parse(selector).unwrap();
    Html::parse_document(html).select(&sel).next().is_some()
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.site.visits.lock().unwrap().push(url.to_string());
        if self.site.panics.contains(url) {
            panic!("renderer crashed on {url}");
        }
        if self.site.hangs.contains(url) {
            std::future::pending::<()>().await;
        }
        self.current = Some(url.to_string());
        if take_one(&self.site.slow_loads, url) {
            return Err(ScrapeError::Timeout {
                what: format!("navigation to {url}"),
                after: Duration::from_secs(1),
            });
        }
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        self.site.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let url = self.current.clone().unwrap_or_default();
        let stalled = take_one(&self.site.stalls, &url);
        let rendered = self
            .site
            .pages
            .get(&url)
            .is_some_and(|html| selector_matches(html, selector));
        if stalled || !rendered {
            return Err(ScrapeError::Timeout {
                what: selector.to_string(),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        let url = self.current.clone().unwrap_or_default();
        self.site
            .pages
            .get(&url)
            .cloned()
            .ok_or_else(|| ScrapeError::MissingElement(url))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.site.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.site.drops.fetch_add(1, Ordering::SeqCst);
    }
}

// ─────────────────────── html builders ───────────────────────

fn listing_url(page: u32) -> String {
    format!("{BASE}#s=1&page={page}")
}

fn detail_url(id: &str) -> String {
    format!("{BASE}b/{id}")
}

fn listing(ids: &[&str]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| format!(r#"<li class="logGroup"><a class="logGroup__target" href="/b/{id}">{id}</a></li>"#))
        .collect();
    format!("<html><body><ul>{cards}</ul></body></html>")
}

enum Row<'a> {
    Header(&'a str),
    Part(&'a str, &'a str),
    NoPrice(&'a str),
}

fn detail(rows: &[Row<'_>]) -> String {
    let body: String = rows
        .iter()
        .map(|row| match row {
            Row::Header(cat) => format!(
                r#"<tr><td class="td__component" colspan="2"><h4>{cat}</h4></td></tr>"#
            ),
            Row::Part(name, price) => format!(
                r#"<tr><td class="td__component">c</td><td class="td__name"><a href="/p/x">{name}</a></td><td class="td__price">{price}</td></tr>"#
            ),
            Row::NoPrice(name) => format!(
                r#"<tr><td class="td__component">c</td><td class="td__name"><a href="/p/x">{name}</a></td></tr>"#
            ),
        })
        .collect();
    format!(r#"<html><body><div class="partlist"><table><tbody>{body}</tbody></table></div></body></html>"#)
}

fn simple_build(cpu: &str) -> String {
    detail(&[Row::Header("CPU"), Row::Part(cpu, "$100")])
}

fn test_config(profile_root: &std::path::Path) -> ScrapeConfig {
    ScrapeConfig {
        base_url: BASE.to_string(),
        filter: "1".to_string(),
        workers: 3,
        profile_root: profile_root.to_path_buf(),
        listing_timeout: Duration::from_secs(1),
        detail_timeout: Duration::from_secs(1),
        page_delay: Delay::none(),
        build_delay: Delay::none(),
        job_deadline: Duration::from_secs(10),
        ..ScrapeConfig::default()
    }
}

async fn run(site: Arc<FakeSite>, config: ScrapeConfig, start: u32, end: u32) -> RunReport {
    let pool = config.pool_size();
    let scheduler = Scheduler::new(Arc::new(config), Arc::new(FakeLauncher { site }));
    scheduler.run_jobs(scheduler::plan_jobs(start, end, pool)).await
}

fn status_of(report: &RunReport, page: u32) -> &JobStatus {
    &report.jobs.iter().find(|j| j.page == page).unwrap().status
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_two_build_page_end_to_end() {
    let site = FakeSite::default()
        .page(&listing_url(1), listing(&["a", "b"]))
        .page(
            &detail_url("a"),
            detail(&[
                Row::Header("CPU"),
                Row::Part("Ryzen 7", "$300"),
                Row::Header("Video Card"),
                Row::Part("RTX 4070", "$600"),
            ]),
        )
        .page(
            &detail_url("b"),
            detail(&[Row::Header("CPU"), Row::Part("i7", "$350"), Row::NoPrice("Z790")]),
        );
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();

    let report = run(Arc::clone(&site), test_config(root.path()), 1, 1).await;

    assert_eq!(report.total_builds(), 1);
    assert_eq!(report.builds[0].source, detail_url("a"));
    match status_of(&report, 1) {
        JobStatus::Completed { stats } => {
            assert_eq!(stats.links, 2);
            assert_eq!(stats.accepted, 1);
            assert_eq!(stats.rejected, 1);
            assert_eq!(stats.failed, 0);
        }
        other => panic!("unexpected status {other:?}"),
    }

    let mut out = Vec::new();
    sink::write_builds(&mut out, &report.builds).unwrap();
    let csv = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "1,Ryzen 7,,,,RTX 4070,,,900.00");

    assert_eq!(site.launches.load(Ordering::SeqCst), 1);
    assert_eq!(site.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_page_does_not_affect_neighbours() {
    let mut site = FakeSite::default()
        .page(&listing_url(11), listing(&["p11"]))
        .page(&listing_url(13), listing(&["p13"]))
        .page(&detail_url("p11"), simple_build("Ryzen 5 7600"))
        .page(&detail_url("p13"), simple_build("Core i5-14600K"));
    site.panics.insert(listing_url(12));
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();

    let report = run(Arc::clone(&site), test_config(root.path()), 11, 13).await;

    assert_eq!(report.jobs.len(), 3);
    let mut cpus: Vec<&str> = report
        .builds
        .iter()
        .map(|b| b.components[0].name.as_str())
        .collect();
    cpus.sort();
    assert_eq!(cpus, vec!["Core i5-14600K", "Ryzen 5 7600"]);

    match status_of(&report, 12) {
        JobStatus::Failed { reason } => assert!(reason.contains("renderer crashed")),
        other => panic!("page 12 should have failed, got {other:?}"),
    }
    assert_eq!(report.failed_jobs(), 1);
    // The panicking job's session is still released by drop.
    assert_eq!(site.drops.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_listing_timeout_retried_once_then_succeeds() {
    let site = FakeSite::default()
        .page(&listing_url(5), listing(&["x"]))
        .page(&detail_url("x"), simple_build("Ryzen 9 7950X"))
        .stall(&listing_url(5), 1);
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();

    let report = run(Arc::clone(&site), test_config(root.path()), 5, 5).await;

    assert_eq!(report.total_builds(), 1);
    assert_eq!(site.reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_listing_second_timeout_fails_page() {
    let site = FakeSite::default()
        .page(&listing_url(5), listing(&["x"]))
        .page(&detail_url("x"), simple_build("Ryzen 9 7950X"))
        .stall(&listing_url(5), 2);
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();

    let report = run(Arc::clone(&site), test_config(root.path()), 5, 5).await;

    assert_eq!(report.total_builds(), 0);
    assert_eq!(site.reloads.load(Ordering::SeqCst), 1);
    assert_eq!(site.visits_to(&detail_url("x")), 0);
    assert!(matches!(status_of(&report, 5), JobStatus::Failed { .. }));
    assert_eq!(site.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_listing_navigation_timeout_reloads_once() {
    let site = FakeSite::default()
        .page(&listing_url(6), listing(&["y"]))
        .page(&detail_url("y"), simple_build("Ryzen 5 5600X"))
        .slow_load(&listing_url(6), 1);
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();

    let report = run(Arc::clone(&site), test_config(root.path()), 6, 6).await;

    assert_eq!(site.visits_to(&listing_url(6)), 1);
    assert_eq!(site.reloads.load(Ordering::SeqCst), 1);
    assert_eq!(report.total_builds(), 1);
    match status_of(&report, 6) {
        JobStatus::Completed { stats } => assert_eq!(stats.links, 1),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn test_build_delay_skipped_after_failed_load() {
    let site = FakeSite::default()
        .page(&listing_url(7), listing(&["good", "partial", "dead"]))
        .page(&detail_url("good"), simple_build("Core i9-14900K"))
        .page(
            &detail_url("partial"),
            detail(&[Row::Header("CPU"), Row::NoPrice("Core i3")]),
        )
        .page(&detail_url("dead"), simple_build("Pentium"))
        .stall(&detail_url("dead"), 1);
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();
    let gap = Duration::from_millis(250);
    let config = ScrapeConfig {
        build_delay: Delay::new(gap, gap),
        ..test_config(root.path())
    };

    let start = std::time::Instant::now();
    let report = run(Arc::clone(&site), config, 7, 7).await;
    let elapsed = start.elapsed();

    match status_of(&report, 7) {
        JobStatus::Completed { stats } => {
            assert_eq!((stats.accepted, stats.rejected, stats.failed), (1, 1, 1));
        }
        other => panic!("unexpected status {other:?}"),
    }
    // One pause each for the accepted and rejected build, none for the failure.
    assert!(elapsed >= gap * 2, "paused too little: {elapsed:?}");
    assert!(elapsed < gap * 3, "paused after the failed load: {elapsed:?}");
}

#[tokio::test]
async fn test_detail_timeout_not_retried() {
    let site = FakeSite::default()
        .page(&listing_url(2), listing(&["slow", "ok"]))
        .page(&detail_url("slow"), simple_build("Athlon"))
        .page(&detail_url("ok"), simple_build("Ryzen 3"))
        .stall(&detail_url("slow"), 5);
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();

    let report = run(Arc::clone(&site), test_config(root.path()), 2, 2).await;

    assert_eq!(site.visits_to(&detail_url("slow")), 1);
    assert_eq!(report.total_builds(), 1);
    assert_eq!(report.builds[0].components[0].name, "Ryzen 3");
    match status_of(&report, 2) {
        JobStatus::Completed { stats } => assert_eq!(stats.failed, 1),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn test_session_init_failure_is_job_local() {
    let mut site = FakeSite::default()
        .page(&listing_url(1), listing(&["one"]))
        .page(&listing_url(2), listing(&["two"]))
        .page(&detail_url("one"), simple_build("A"))
        .page(&detail_url("two"), simple_build("B"));
    site.failed_launches.insert(0);
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();
    let config = ScrapeConfig {
        workers: 1,
        ..test_config(root.path())
    };

    let report = run(Arc::clone(&site), config, 1, 2).await;

    match status_of(&report, 1) {
        JobStatus::Failed { reason } => assert!(reason.contains("session init failed")),
        other => panic!("page 1 should have failed, got {other:?}"),
    }
    assert_eq!(report.total_builds(), 1);
    assert_eq!(report.builds[0].components[0].name, "B");
    assert_eq!(site.launches.load(Ordering::SeqCst), 2);
    assert_eq!(site.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hung_job_is_bounded_by_deadline() {
    let mut site = FakeSite::default()
        .page(&listing_url(2), listing(&["fine"]))
        .page(&detail_url("fine"), simple_build("Ryzen 7 7700"));
    site.hangs.insert(listing_url(1));
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();
    let config = ScrapeConfig {
        job_deadline: Duration::from_millis(200),
        ..test_config(root.path())
    };

    let report = run(Arc::clone(&site), config, 1, 2).await;

    match status_of(&report, 1) {
        JobStatus::Failed { reason } => assert!(reason.contains("deadline")),
        other => panic!("page 1 should have failed, got {other:?}"),
    }
    assert_eq!(report.total_builds(), 1);
    assert_eq!(site.drops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_listing_yields_no_builds() {
    let site = FakeSite::default().page(
        &listing_url(3),
        r#"<html><body><li class="logGroup"><em>ad</em></li></body></html>"#.to_string(),
    );
    let site = Arc::new(site);
    let root = tempfile::tempdir().unwrap();

    let report = run(Arc::clone(&site), test_config(root.path()), 3, 3).await;

    assert_eq!(report.total_builds(), 0);
    match status_of(&report, 3) {
        JobStatus::Completed { stats } => {
            assert_eq!(stats.links, 0);
            assert_eq!(stats.skipped_cards, 1);
        }
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn test_run_cleans_stale_profiles_first() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("chrome_profile_1_leftover")).unwrap();
    let config = ScrapeConfig {
        start_page: 4,
        end_page: 3,
        ..test_config(root.path())
    };
    let scheduler = Scheduler::new(
        Arc::new(config),
        Arc::new(FakeLauncher {
            site: Arc::new(FakeSite::default()),
        }),
    );

    let report = scheduler.run().await;

    assert_eq!(report.stale_profiles_removed, 1);
    assert!(report.jobs.is_empty());
    assert!(!root.path().join("chrome_profile_1_leftover").exists());
}
