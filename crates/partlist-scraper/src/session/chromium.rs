// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium sessions using chromiumoxide.

use super::{profile, BrowserSession, SessionLauncher, WindowGeometry};
use crate::config::{self, Monitor, ScrapeConfig};
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Interval between selector polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Runs before any page script so `navigator.webdriver` reads as unset.
const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. --chromium-path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured Chromium path does not exist");
    }

    // 2. PARTLIST_CHROMIUM_PATH env
    if let Some(path) = config::read_env_path(config::CHROMIUM_PATH_ENV) {
        if path.exists() {
            return Some(path);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one visible (or headless) Chromium per session.
pub struct ChromiumLauncher {
    chromium_path: Option<PathBuf>,
    profile_root: PathBuf,
    monitor: Monitor,
    headless: bool,
    navigation_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            chromium_path: config.chromium_path.clone(),
            profile_root: config.profile_root.clone(),
            monitor: config.monitor,
            headless: config.headless,
            navigation_timeout: config.listing_timeout.max(config.detail_timeout),
        }
    }

    fn browser_config(&self, chrome: &Path, profile: &Path, slot: usize) -> Result<BrowserConfig> {
        let geometry = WindowGeometry::for_slot(self.monitor, slot);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .user_data_dir(profile)
            .window_size(geometry.width, geometry.height)
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg(format!("--window-position={},{}", geometry.x, geometry.y));

        if !self.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| ScrapeError::Launch(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self, slot: usize) -> Result<Box<dyn BrowserSession>> {
        let chrome = find_chromium(self.chromium_path.as_deref()).ok_or_else(|| {
            ScrapeError::Launch(format!(
                "Chromium not found. Pass --chromium-path or set {}.",
                config::CHROMIUM_PATH_ENV
            ))
        })?;

        // Dropped (and deleted) on any early return below.
        let profile_dir = profile::create(&self.profile_root, slot)?;
        let browser_config = self.browser_config(&chrome, profile_dir.path(), slot)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::Launch(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromiumoxide handler event error: {e}");
                }
            }
        });

        let page = match open_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(e);
            }
        };

        debug!(slot, profile = %profile_dir.path().display(), "Chromium session launched");

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page: Some(page),
            handler_task: Some(handler_task),
            profile_dir: Some(profile_dir),
            navigation_timeout: self.navigation_timeout,
        }))
    }
}

async fn open_page(browser: &Browser) -> Result<Page> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| ScrapeError::Launch(format!("failed to create page: {e}")))?;
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
        .await
        .map_err(|e| ScrapeError::Launch(format!("failed to inject init script: {e}")))?;
    Ok(page)
}

/// One Chromium process, its page, and its profile directory.
///
/// `close` tears everything down once. If the session is dropped without
/// `close` (deadline expiry, panic), `Drop` aborts the handler, the browser
/// kills its child process on drop, and the profile directory is removed.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    profile_dir: Option<TempDir>,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::Script("session already closed".to_string()))
    }
}

async fn selector_present(page: &Page, selector: &str) -> Result<bool> {
    let literal = serde_json::to_string(selector)
        .map_err(|e| ScrapeError::Script(format!("bad selector {selector}: {e}")))?;
    let script = format!("document.querySelector({literal}) !== null");
    let result = page
        .evaluate(script)
        .await
        .map_err(|e| ScrapeError::Script(e.to_string()))?;
    Ok(result.into_value::<bool>().unwrap_or(false))
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let page = self.page()?;
        match tokio::time::timeout(self.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::navigation(url, e)),
            Err(_) => Err(ScrapeError::Timeout {
                what: format!("navigation to {url}"),
                after: self.navigation_timeout,
            }),
        }
    }

    async fn reload(&mut self) -> Result<()> {
        let page = self.page()?;
        match tokio::time::timeout(self.navigation_timeout, page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::navigation("reload", e)),
            Err(_) => Err(ScrapeError::Timeout {
                what: "page reload".to_string(),
                after: self.navigation_timeout,
            }),
        }
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Script errors are expected while the document is still swapping.
            if let Ok(true) = selector_present(page, selector).await {
                return Ok(());
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(ScrapeError::Timeout {
                    what: selector.to_string(),
                    after: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| ScrapeError::Script(format!("failed to read page HTML: {e}")))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let mut first_error = None;

        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                first_error.get_or_insert(ScrapeError::Launch(format!("browser close: {e}")));
            }
            if let Err(e) = browser.wait().await {
                first_error.get_or_insert(ScrapeError::Io(e));
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        if let Some(dir) = self.profile_dir.take() {
            if let Err(e) = dir.close() {
                first_error.get_or_insert(ScrapeError::Io(e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        if self.browser.is_some() {
            warn!("Chromium session dropped without close; killing browser");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(headless: bool) -> ChromiumLauncher {
        ChromiumLauncher::new(&ScrapeConfig {
            headless,
            ..ScrapeConfig::default()
        })
    }

    #[test]
    fn test_browser_config_builds() {
        let profile = tempfile::tempdir().unwrap();
        let config = launcher(true).browser_config(
            Path::new("/usr/bin/chromium"),
            profile.path(),
            3,
        );
        assert!(config.is_ok());
    }

    #[test]
    fn test_missing_explicit_path_falls_through() {
        let bogus = Path::new("/definitely/not/a/chrome");
        assert_ne!(find_chromium(Some(bogus)).as_deref(), Some(bogus));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_launch_navigate_close() {
        let root = tempfile::tempdir().unwrap();
        let launcher = ChromiumLauncher::new(&ScrapeConfig {
            headless: true,
            profile_root: root.path().to_path_buf(),
            ..ScrapeConfig::default()
        });
        let mut session = launcher.launch(0).await.expect("launch failed");
        session
            .goto("data:text/html,<div class='partlist'><table><tbody></tbody></table></div>")
            .await
            .expect("navigation failed");
        session
            .wait_for_selector(".partlist", Duration::from_secs(5))
            .await
            .expect("selector never appeared");
        let html = session.content().await.expect("content failed");
        assert!(html.contains("partlist"));
        session.close().await.expect("close failed");

        let leftover = std::fs::read_dir(root.path()).unwrap().count();
        assert_eq!(leftover, 0);
    }
}
