//! End-to-end pipeline test: canned listing and detail pages flow through
//! the crawler into the duplicate-safe store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tempfile::tempdir;

use bookscrape::config::ScrapeConfig;
use bookscrape::models::BookRecord;
use bookscrape::repository::BookRepository;
use bookscrape::scrape::{Crawler, PageFetcher};

const BASE: &str = "https://books.toscrape.com";

struct FakeFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    history: Vec<String>,
    current: Option<String>,
}

impl FakeFetcher {
    fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages,
            failing: HashSet::new(),
            history: Vec::new(),
            current: None,
        }
    }

    fn fail_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn load(&mut self, url: &str, _max_attempts: u32) -> bool {
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
                <p class="star-rating Four"></p>
                <h3><a href="../../../book-{page}-{i}/index.html"
                       title="Book {page}-{i}">Book {page}...</a></h3>
                <p class="price_color">£22.{i:02}</p>
                <p class="availability">In stock ({i} available)</p>
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

async fn scrape(pages: u32, entries: u32, page_count: u32, quota: usize) -> Vec<BookRecord> {
    let fetcher = FakeFetcher::new(fixture(pages, entries));
    let mut crawler = Crawler::new(fetcher, test_config());
    crawler.scrape(page_count, quota).await
}

#[tokio::test]
async fn full_run_persists_every_distinct_record_once() {
    let records = scrape(3, 20, 3, 5).await;

    assert_eq!(records.len(), 60);
    assert_eq!(records.iter().filter(|b| b.upc.is_some()).count(), 5);
    assert_eq!(records.iter().filter(|b| b.has_full_details()).count(), 5);

    let dir = tempdir().unwrap();
    let repo = BookRepository::new(&dir.path().join("books.db")).unwrap();

    let mut inserted = 0;
    for book in &records {
        if repo.insert(book).unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 60);
    assert_eq!(repo.count().unwrap(), 60);

    // A second pass over the same records inserts nothing.
    for book in &records {
        assert!(!repo.insert(book).unwrap());
    }
    assert_eq!(repo.count().unwrap(), 60);
}

#[tokio::test]
async fn rescrape_dedupes_on_upc_even_if_title_changed() {
    let records = scrape(1, 5, 1, 5).await;
    let dir = tempdir().unwrap();
    let repo = BookRepository::new(&dir.path().join("books.db")).unwrap();

    for book in &records {
        repo.insert(book).unwrap();
    }
    assert_eq!(repo.count().unwrap(), 5);

    let mut renamed = records[0].clone();
    renamed.title = "Retitled Edition".to_string();
    assert!(!repo.insert(&renamed).unwrap());
    assert_eq!(repo.count().unwrap(), 5);
}

#[tokio::test]
async fn lost_page_does_not_stop_the_run() {
    let fetcher =
        FakeFetcher::new(fixture(3, 6)).fail_on(&format!("{}/catalogue/page-2.html", BASE));
    let mut crawler = Crawler::new(fetcher, test_config());
    let records = crawler.scrape(3, 2).await;

    // Page two's records are simply absent.
    assert_eq!(records.len(), 12);
    assert_eq!(records.iter().filter(|b| b.upc.is_some()).count(), 2);

    let dir = tempdir().unwrap();
    let repo = BookRepository::new(&dir.path().join("books.db")).unwrap();
    for book in &records {
        assert!(repo.insert(book).unwrap());
    }
    assert_eq!(repo.count().unwrap(), 12);
}
