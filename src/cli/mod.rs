//! CLI surface and run orchestration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::repository::BookRepository;
use crate::scrape::Crawler;

#[derive(Parser)]
#[command(name = "bookscrape")]
#[command(about = "Book catalog scraper with duplicate-safe SQLite storage")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Catalog base URL
    #[arg(long, env = "BOOKSCRAPE_BASE_URL")]
    base_url: Option<String>,

    /// Number of listing pages to scan
    #[arg(short, long)]
    pages: Option<u32>,

    /// Detail-enriched record quota for the run
    #[arg(short, long)]
    details: Option<usize>,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Run the full scrape-and-store process.
///
/// Exit is 0 on full success and 1 on critical failure or interrupt; there
/// is no partial-success code. Non-fatal problems (skipped pages, duplicate
/// records, per-record storage faults) are logged and counted instead.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(base_url) = cli.base_url {
        config.scraper.base_url = base_url;
    }
    if let Some(pages) = cli.pages {
        config.scraper.max_pages = pages;
    }
    if let Some(details) = cli.details {
        config.scraper.detail_limit = details;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if cli.chrome_path.is_some() {
        config.browser.chrome_path = cli.chrome_path;
    }

    info!("starting book scrape against {}", config.scraper.base_url);

    let repo = BookRepository::new(&config.db_path).context("failed to open database")?;
    let initial_count = repo.count()?;
    info!("books in database before scraping: {}", initial_count);

    // Browser launch failure is fatal; nothing to clean up yet.
    let session = BrowserSession::launch(
        &config.browser,
        Duration::from_millis(config.scraper.retry_backoff_ms),
    )
    .await?;

    let pages = config.scraper.max_pages;
    let detail_limit = config.scraper.detail_limit;
    info!(
        "strategy: basic info from {} pages, full details for {} books",
        pages, detail_limit
    );

    let mut crawler = Crawler::new(session, config.scraper.clone());
    let records = tokio::select! {
        records = crawler.scrape(pages, detail_limit) => Some(records),
        _ = tokio::signal::ctrl_c() => None,
    };

    // Teardown happens before anything else on both paths.
    crawler.into_fetcher().close().await;

    let Some(records) = records else {
        warn!("interrupted by user");
        anyhow::bail!("interrupted");
    };

    info!("saving {} books to the database", records.len());
    let mut inserted = 0u64;
    let mut duplicates = 0u64;
    let mut errors = 0u64;
    let mut with_details = 0u64;

    for book in &records {
        match repo.insert(book) {
            Ok(true) => {
                inserted += 1;
                if book.has_full_details() {
                    with_details += 1;
                }
            }
            Ok(false) => duplicates += 1,
            Err(e) => {
                error!("failed to insert '{}': {}", book.title, e);
                errors += 1;
            }
        }
    }

    let final_count = repo.count()?;
    info!("scrape finished");
    info!("  extracted:        {}", records.len());
    info!("  inserted:         {}", inserted);
    info!("  with details:     {}", with_details);
    info!("  duplicates:       {}", duplicates);
    info!("  errors:           {}", errors);
    info!("  total in database: {}", final_count);

    Ok(())
}
