//! Page-to-record extraction pipeline.

pub mod crawl;
pub mod extract;

pub use crawl::Crawler;
pub use extract::{extract_listing, resolve_book_url, resolve_image_url};

use async_trait::async_trait;

/// Capability the pipeline needs from a browser session: navigate with
/// retries, read the current document, and go back in history.
///
/// The crawler and extractor are written against this trait so they can be
/// exercised in tests with canned pages instead of a live browser.
#[async_trait]
pub trait PageFetcher {
    /// Navigate to `url`, retrying up to `max_attempts` times.
    ///
    /// Returns true once the page reports ready. After a false return the
    /// browser state is unspecified; callers decide whether to skip or abort.
    async fn load(&mut self, url: &str, max_attempts: u32) -> bool;

    /// Full HTML of the current document.
    async fn html(&mut self) -> anyhow::Result<String>;

    /// Navigate back in history to the previous page.
    async fn back(&mut self) -> anyhow::Result<()>;
}
