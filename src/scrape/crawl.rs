//! Pagination controller: drives the fetcher and extractor across a page
//! range while tracking the global detail quota.

use std::time::Duration;

use tracing::{info, warn};

use super::extract::{extract_listing, DetailPolicy};
use super::PageFetcher;
use crate::config::ScrapeConfig;
use crate::models::BookRecord;

/// Sequential page crawler with a running detail quota.
pub struct Crawler<F> {
    fetcher: F,
    config: ScrapeConfig,
}

impl<F> Crawler<F>
where
    F: PageFetcher + Send,
{
    pub fn new(fetcher: F, config: ScrapeConfig) -> Self {
        Self { fetcher, config }
    }

    /// Recover the fetcher for teardown.
    pub fn into_fetcher(self) -> F {
        self.fetcher
    }

    /// Scrape listing pages `1..=page_count`, enriching up to `detail_quota`
    /// records with their detail pages.
    ///
    /// A page that fails to load after the configured retries is skipped;
    /// its records are simply absent. The quota is decremented by the number
    /// of records per page that came back with a UPC, so the per-page
    /// `details_remaining` caps detail visits exactly. Output preserves page
    /// order, then within-page DOM order.
    pub async fn scrape(&mut self, page_count: u32, detail_quota: usize) -> Vec<BookRecord> {
        let policy = DetailPolicy::from(&self.config);
        let page_delay = Duration::from_millis(self.config.request_delay_ms);
        let base = self.config.base().to_string();

        let mut all_books: Vec<BookRecord> = Vec::new();
        let mut detailed_so_far = 0usize;

        for page_num in 1..=page_count {
            let url = self.config.page_url(page_num);
            info!("processing page {}/{}: {}", page_num, page_count, url);

            if !self.fetcher.load(&url, self.config.load_attempts).await {
                warn!("page {} did not load, continuing with next page", page_num);
                continue;
            }

            let html = match self.fetcher.html().await {
                Ok(html) => html,
                Err(e) => {
                    warn!("could not read page {}: {}", page_num, e);
                    continue;
                }
            };

            let details_remaining = detail_quota.saturating_sub(detailed_so_far);
            let books = extract_listing(
                &mut self.fetcher,
                &html,
                &base,
                details_remaining > 0,
                details_remaining,
                &policy,
            )
            .await;

            // Quota accounting counts records that actually carry a UPC, not
            // detail-fetch attempts.
            detailed_so_far += books.iter().filter(|b| b.upc.is_some()).count();

            info!(
                "page {} done: {} records, {}/{} with details",
                page_num,
                books.len(),
                detailed_so_far,
                detail_quota
            );
            all_books.extend(books);

            if detailed_so_far >= detail_quota && detail_quota > 0 {
                info!("detail quota of {} reached, remaining pages basic-only", detail_quota);
            }

            // Rate limit between pages, but not after the last one.
            if page_num < page_count {
                tokio::time::sleep(page_delay).await;
            }
        }

        info!(
            "scrape complete: {} records, {} with details",
            all_books.len(),
            detailed_so_far
        );
        all_books
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;

    use super::*;
    use crate::scrape::PageFetcher;

    const BASE: &str = "https://books.toscrape.com";

    /// In-memory fetcher over canned pages with history back-navigation.
    pub struct FakeFetcher {
        pages: HashMap<String, String>,
        failing: HashSet<String>,
        history: Vec<String>,
        current: Option<String>,
        pub loads: Vec<String>,
    }

    impl FakeFetcher {
        pub fn new(pages: HashMap<String, String>) -> Self {
            Self {
                pages,
                failing: HashSet::new(),
                history: Vec::new(),
                current: None,
                loads: Vec::new(),
            }
        }

        pub fn fail_on(mut self, url: &str) -> Self {
            self.failing.insert(url.to_string());
            self
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn load(&mut self, url: &str, _max_attempts: u32) -> bool {
            self.loads.push(url.to_string());
            if self.failing.contains(url) || !self.pages.contains_key(url) {
                return false;
            }
            if let Some(prev) = self.current.take() {
                self.history.push(prev);
            }
            self.current = Some(url.to_string());
            true
        }

        async fn html(&mut self) -> anyhow::Result<String> {
            let current = self
                .current
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no page loaded"))?;
            Ok(self.pages[current].clone())
        }

        async fn back(&mut self) -> anyhow::Result<()> {
            self.current = self.history.pop();
            Ok(())
        }
    }

    fn listing_page(page: u32, entries: u32) -> String {
        let mut body = String::new();
        for i in 0..entries {
            body.push_str(&format!(
                r#"<article class="product_pod">
                    <a href="../../../book-{page}-{i}/index.html">
                        <img src="../../media/cache/{page}/{i}.jpg"></a>
                    <p class="star-rating Three"></p>
                    <h3><a href="../../../book-{page}-{i}/index.html"
                           title="Book {page}-{i}">Book {page}-...</a></h3>
                    <p class="price_color">£10.{i:02}</p>
                    <p class="availability">In stock</p>
                </article>"#
            ));
        }
        format!("<html><body>{}</body></html>", body)
    }

    fn detail_page(page: u32, i: u32) -> String {
        format!(
            r#"<html><body>
            <ul class="breadcrumb"><li>Home</li><li>Books</li><li>Fiction</li><li>x</li></ul>
            <article class="product_page">
                <p>Description of book {page}-{i}.</p>
                <table class="table"><tr><th>UPC</th><td>upc-{page}-{i}</td></tr></table>
            </article>
            </body></html>"#
        )
    }

    fn fixture(pages: u32, entries_per_page: u32) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for page in 1..=pages {
            map.insert(
                format!("{}/catalogue/page-{}.html", BASE, page),
                listing_page(page, entries_per_page),
            );
            for i in 0..entries_per_page {
                map.insert(
                    format!("{}/catalogue/book-{}-{}/index.html", BASE, page, i),
                    detail_page(page, i),
                );
            }
        }
        map
    }

    fn test_config() -> ScrapeConfig {
        ScrapeConfig {
            base_url: BASE.to_string(),
            request_delay_ms: 0,
            settle_delay_ms: 0,
            load_attempts: 1,
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn detail_quota_is_exact_across_pages() {
        let fetcher = FakeFetcher::new(fixture(3, 20));
        let mut crawler = Crawler::new(fetcher, test_config());

        let books = crawler.scrape(3, 5).await;

        assert_eq!(books.len(), 60);
        let detailed: Vec<_> = books.iter().filter(|b| b.upc.is_some()).collect();
        assert_eq!(detailed.len(), 5);
        for book in &detailed {
            assert!(book.has_full_details());
        }
        // The rest carry no detail fields at all.
        for book in books.iter().filter(|b| b.upc.is_none()) {
            assert_eq!(book.description, None);
            assert_eq!(book.category, None);
        }
        // Enrichment hits the first five entries of page one, in order.
        assert_eq!(books[0].upc.as_deref(), Some("upc-1-0"));
        assert_eq!(books[4].upc.as_deref(), Some("upc-1-4"));
        assert_eq!(books[5].upc, None);
    }

    #[tokio::test]
    async fn quota_spills_into_next_page_when_first_page_is_short() {
        let fetcher = FakeFetcher::new(fixture(2, 3));
        let mut crawler = Crawler::new(fetcher, test_config());

        let books = crawler.scrape(2, 5).await;

        assert_eq!(books.len(), 6);
        // Three details from page one, two more from page two.
        let upcs: Vec<_> = books.iter().filter_map(|b| b.upc.as_deref()).collect();
        assert_eq!(upcs, vec!["upc-1-0", "upc-1-1", "upc-1-2", "upc-2-0", "upc-2-1"]);
    }

    #[tokio::test]
    async fn failed_page_is_skipped_and_later_pages_processed() {
        let fetcher =
            FakeFetcher::new(fixture(3, 4)).fail_on(&format!("{}/catalogue/page-2.html", BASE));
        let mut crawler = Crawler::new(fetcher, test_config());

        let books = crawler.scrape(3, 0).await;

        assert_eq!(books.len(), 8);
        assert!(books.iter().all(|b| b.upc.is_none()));
        let titles: HashSet<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert!(titles.contains("Book 1-0"));
        assert!(titles.contains("Book 3-3"));
        assert!(!titles.contains("Book 2-0"));
    }

    #[tokio::test]
    async fn zero_quota_never_visits_detail_pages() {
        let fetcher = FakeFetcher::new(fixture(2, 5));
        let mut crawler = Crawler::new(fetcher, test_config());

        let books = crawler.scrape(2, 0).await;

        assert_eq!(books.len(), 10);
        let fetcher = crawler.into_fetcher();
        assert!(fetcher.loads.iter().all(|url| url.contains("page-")));
    }

    #[tokio::test]
    async fn failed_detail_fetch_leaves_record_basic() {
        let mut pages = fixture(1, 3);
        pages.remove(&format!("{}/catalogue/book-1-1/index.html", BASE));
        let fetcher = FakeFetcher::new(pages);
        let mut crawler = Crawler::new(fetcher, test_config());

        let books = crawler.scrape(1, 3).await;

        assert_eq!(books.len(), 3);
        assert_eq!(books[0].upc.as_deref(), Some("upc-1-0"));
        assert_eq!(books[1].upc, None);
        assert_eq!(books[1].description, None);
        assert_eq!(books[2].upc.as_deref(), Some("upc-1-2"));
    }
}
