//! Headless Chromium session driven over CDP.
//!
//! Owns the browser process and a single tab for the whole run, so history
//! back-navigation behaves like a user's browser. Implements [`PageFetcher`]
//! for the scrape pipeline.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::BrowserSessionConfig;
use crate::scrape::PageFetcher;

/// Resolves when the document is usable, or with "timeout" if the load
/// event never fires.
const READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Browser session owning one Chromium process and one reused tab.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    page_load_timeout: Duration,
    retry_backoff: Duration,
}

impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Find the Chrome executable: config override first, then the
    /// platform-typical locations, then PATH.
    fn find_chrome(configured: Option<&PathBuf>) -> anyhow::Result<PathBuf> {
        if let Some(path) = configured {
            if path.exists() {
                info!("using configured Chrome at {}", path.display());
                return Ok(path.clone());
            }
            warn!("configured Chrome path {} does not exist", path.display());
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("found Chrome at {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Please install it:\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or set browser.chrome_path in the config"
        ))
    }

    /// Launch the browser and open the tab used for the whole run.
    ///
    /// A launch failure here is fatal for the run; there is no degraded mode.
    pub async fn launch(
        config: &BrowserSessionConfig,
        retry_backoff: Duration,
    ) -> anyhow::Result<Self> {
        let chrome_path = Self::find_chrome(config.chrome_path.as_ref())?;

        info!("launching browser (headless={})", config.headless);

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg(format!("--window-size={}", config.window_size))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser")?;

        // Drive the CDP event loop for the lifetime of the session.
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open browser tab")?;

        info!("browser session initialized");

        Ok(Self {
            browser,
            page,
            page_load_timeout: Duration::from_secs(config.page_load_timeout),
            retry_backoff,
        })
    }

    /// Navigate the tab and wait for readiness. One attempt.
    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid URL {}: {}", url, e))?;

        self.page
            .execute(nav_params)
            .await
            .with_context(|| format!("navigation to {} failed", url))?;

        self.wait_ready().await
    }

    /// Wait for the minimal readiness signal: document interactive and the
    /// root content element present.
    async fn wait_ready(&self) -> anyhow::Result<()> {
        let ready = tokio::time::timeout(
            self.page_load_timeout,
            self.page.evaluate(READY_SCRIPT.to_string()),
        )
        .await
        .map_err(|_| anyhow::anyhow!("timeout waiting for page ready state"))?
        .context("ready-state check failed")?;

        let state: String = ready.into_value().unwrap_or_else(|_| "unknown".to_string());
        if state == "timeout" {
            anyhow::bail!("page never became ready");
        }
        debug!("page ready state: {}", state);

        tokio::time::timeout(self.page_load_timeout, self.page.find_element("body"))
            .await
            .map_err(|_| anyhow::anyhow!("timeout waiting for body element"))?
            .context("body element not present")?;

        Ok(())
    }

    /// Tear down the tab and the browser process. Best-effort; errors are
    /// logged, not propagated, since teardown runs on every exit path.
    pub async fn close(self) {
        let BrowserSession { mut browser, page, .. } = self;
        if let Err(e) = page.close().await {
            debug!("page close failed: {}", e);
        }
        if let Err(e) = browser.close().await {
            warn!("browser close failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("browser did not exit cleanly: {}", e);
        }
        info!("browser session closed");
    }
}

#[async_trait]
impl PageFetcher for BrowserSession {
    async fn load(&mut self, url: &str, max_attempts: u32) -> bool {
        for attempt in 1..=max_attempts {
            match self.navigate(url).await {
                Ok(()) => {
                    info!("page loaded: {}", url);
                    return true;
                }
                Err(e) => {
                    warn!("load attempt {}/{} failed for {}: {}", attempt, max_attempts, url, e);
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }
        error!("giving up on {} after {} attempts", url, max_attempts);
        false
    }

    async fn html(&mut self) -> anyhow::Result<String> {
        self.page.content().await.context("failed to read page content")
    }

    async fn back(&mut self) -> anyhow::Result<()> {
        self.page
            .evaluate("window.history.back()".to_string())
            .await
            .context("history back-navigation failed")?;
        self.wait_ready().await
    }
}
