//! Configuration for the scraper, browser session, and database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub scraper: ScrapeConfig,

    #[serde(default)]
    pub browser: BrowserSessionConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/books.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scraper: ScrapeConfig::default(),
            browser: BrowserSessionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };
        // Catch a malformed base URL up front instead of failing mid-run.
        Url::parse(&config.scraper.base_url)
            .with_context(|| format!("invalid base URL {}", config.scraper.base_url))?;
        Ok(config)
    }
}

/// Scrape policy: page range, detail quota, delays, and retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Root URL of the catalog site.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of listing pages to scan.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Global cap on detail-enriched records per run.
    #[serde(default = "default_detail_limit")]
    pub detail_limit: usize,

    /// Delay between requests, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Settle delay after history back-navigation, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Navigation attempts per page before giving up.
    #[serde(default = "default_load_attempts")]
    pub load_attempts: u32,

    /// Backoff between navigation attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_pages: default_max_pages(),
            detail_limit: default_detail_limit(),
            request_delay_ms: default_request_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            load_attempts: default_load_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl ScrapeConfig {
    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Listing page URL for a 1-based page number.
    pub fn page_url(&self, page: u32) -> String {
        format!("{}/catalogue/page-{}.html", self.base(), page)
    }
}

fn default_base_url() -> String {
    "https://books.toscrape.com".to_string()
}

fn default_max_pages() -> u32 {
    3
}

fn default_detail_limit() -> usize {
    5
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_load_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

/// Browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSessionConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Browser window size as "width,height".
    #[serde(default = "default_window_size")]
    pub window_size: String,

    /// Page load timeout in seconds.
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout: u64,

    /// Chrome/Chromium executable. Falls back to platform-typical
    /// locations and PATH lookup when unset or missing.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            window_size: default_window_size(),
            page_load_timeout: default_page_load_timeout(),
            chrome_path: None,
            chrome_args: Vec::new(),
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_window_size() -> String {
    "1920,1080".to_string()
}

fn default_page_load_timeout() -> u64 {
    10
}
