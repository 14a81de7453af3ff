//! Listing and detail page extraction.
//!
//! Parsing is pure: it works on the HTML string the browser session hands
//! back, so every selector path is unit-testable without a live browser.
//! Detail enrichment drives the [`PageFetcher`] to visit individual book
//! pages and navigate back afterward.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, warn};

use super::PageFetcher;
use crate::config::ScrapeConfig;
use crate::models::{rating_from_class, BookRecord};

/// Delays and retry bounds for detail-page visits.
#[derive(Debug, Clone)]
pub struct DetailPolicy {
    /// Delay before each detail-page request.
    pub request_delay: Duration,
    /// Settle delay after back-navigation.
    pub settle_delay: Duration,
    /// Navigation attempts per detail page.
    pub load_attempts: u32,
}

impl From<&ScrapeConfig> for DetailPolicy {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            load_attempts: config.load_attempts,
        }
    }
}

/// A book entry parsed from a listing page, before detail enrichment.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub record: BookRecord,
    /// Canonical absolute URL of the book's detail page, when the entry
    /// carried a usable link.
    pub detail_url: Option<String>,
}

/// Detail-page fields. Each is independently optional: a selector miss for
/// one leaves only that field unset.
#[derive(Debug, Clone, Default)]
pub struct BookDetail {
    pub description: Option<String>,
    pub upc: Option<String>,
    pub category: Option<String>,
}

/// Resolve a book link to its canonical absolute URL.
///
/// The site emits three conventions for the same target: `catalogue/x.html`
/// from the front page, `../../../x.html` from deep listing pages, and
/// occasionally an already-absolute URL. All three normalize to
/// `{base}/catalogue/x.html`.
pub fn resolve_book_url(base: &str, href: &str) -> String {
    if let Some(rest) = href.strip_prefix("../../../") {
        format!("{}/catalogue/{}", base, rest)
    } else if href.starts_with("catalogue/") {
        format!("{}/{}", base, href)
    } else {
        href.to_string()
    }
}

/// Resolve an image `src` to an absolute URL by dropping every `../` segment
/// and prefixing the site base. Absolute URLs pass through unchanged.
pub fn resolve_image_url(base: &str, src: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        src.to_string()
    } else {
        format!("{}/{}", base, src.replace("../", ""))
    }
}

/// Strip the currency symbol and parse the remainder as a decimal price.
fn parse_price(text: &str) -> Option<f64> {
    text.replace('£', "").trim().parse().ok()
}

/// Element text with runs of whitespace collapsed, like a rendered-text read.
fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse all book entries out of a listing page.
///
/// A page with no entries at all is a structural miss: it is reported as an
/// error and yields an empty vec, leaving the pagination decision to the
/// caller. Individual field misses are logged and leave that field unset
/// without dropping the entry.
pub fn parse_listing(html: &str, base: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let pod_sel = Selector::parse("article.product_pod").unwrap();
    let link_sel = Selector::parse("h3 a").unwrap();
    let price_sel = Selector::parse("p.price_color").unwrap();
    let availability_sel = Selector::parse("p.availability").unwrap();
    let rating_sel = Selector::parse("p.star-rating").unwrap();
    let img_sel = Selector::parse("img").unwrap();

    let pods: Vec<_> = document.select(&pod_sel).collect();
    if pods.is_empty() {
        error!("no book entries found on listing page");
        return Vec::new();
    }
    debug!("found {} book entries on listing page", pods.len());

    let mut entries = Vec::with_capacity(pods.len());
    for (idx, pod) in pods.iter().enumerate() {
        // Title and link come from the anchor's attributes; the anchor text
        // is truncated by the site, so it is only a fallback.
        let Some(link) = pod.select(&link_sel).next() else {
            error!("entry {}: no title link, skipping entry", idx + 1);
            continue;
        };
        let title = match link.value().attr("title") {
            Some(title) => title.to_string(),
            None => {
                warn!("entry {}: title attribute missing, using link text", idx + 1);
                collapse_text(link)
            }
        };
        let detail_url = match link.value().attr("href") {
            Some(href) => Some(resolve_book_url(base, href)),
            None => {
                warn!("entry {} ('{}'): detail link missing", idx + 1, title);
                None
            }
        };

        let price = match pod.select(&price_sel).next() {
            Some(el) => {
                let text = collapse_text(el);
                let price = parse_price(&text);
                if price.is_none() {
                    warn!("entry {} ('{}'): unparseable price '{}'", idx + 1, title, text);
                }
                price
            }
            None => {
                warn!("entry {} ('{}'): price element missing", idx + 1, title);
                None
            }
        };

        let availability = match pod.select(&availability_sel).next() {
            Some(el) => collapse_text(el),
            None => {
                warn!("entry {} ('{}'): availability element missing", idx + 1, title);
                String::new()
            }
        };

        let rating = match pod.select(&rating_sel).next() {
            Some(el) => {
                let classes = el.value().attr("class").unwrap_or_default();
                let rating = rating_from_class(classes);
                if rating.is_none() {
                    warn!("entry {} ('{}'): unrecognized rating '{}'", idx + 1, title, classes);
                }
                rating
            }
            None => {
                warn!("entry {} ('{}'): rating element missing", idx + 1, title);
                None
            }
        };

        let image_url = match pod.select(&img_sel).next().and_then(|el| el.value().attr("src")) {
            Some(src) => resolve_image_url(base, src),
            None => {
                warn!("entry {} ('{}'): image element missing", idx + 1, title);
                String::new()
            }
        };

        entries.push(ListingEntry {
            record: BookRecord::basic(title, price, availability, rating, image_url),
            detail_url,
        });
    }

    entries
}

/// Parse the detail-page fields of a single book.
pub fn parse_detail(html: &str, url: &str) -> BookDetail {
    let document = Html::parse_document(html);
    let description_sel = Selector::parse("article.product_page > p").unwrap();
    let row_sel = Selector::parse("table.table tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let breadcrumb_sel = Selector::parse("ul.breadcrumb li").unwrap();

    let mut detail = BookDetail::default();

    match document.select(&description_sel).next() {
        Some(el) => detail.description = Some(collapse_text(el)),
        None => warn!("description not found for {}", url),
    }

    // The product table is label/value rows; the UPC row label is exact.
    for row in document.select(&row_sel) {
        let Some(header) = row.select(&th_sel).next() else {
            continue;
        };
        if collapse_text(header) == "UPC" {
            detail.upc = row.select(&td_sel).next().map(collapse_text);
            break;
        }
    }
    if detail.upc.is_none() {
        warn!("UPC not found for {}", url);
    }

    // Category is the third breadcrumb segment (Home / Books / <category> / title).
    match document.select(&breadcrumb_sel).nth(2) {
        Some(el) => detail.category = Some(collapse_text(el)),
        None => warn!("category not found for {}", url),
    }

    detail
}

/// Extract all book records from a listing page, enriching the first
/// `details_remaining` entries with their detail pages when `want_details`
/// is set.
///
/// Each detail visit is rate-limited, followed by history back-navigation to
/// the listing and a short settle delay. A detail page that fails to load or
/// parse leaves the record basic-only; the entry itself is kept. Output
/// preserves the DOM order of the listing.
pub async fn extract_listing<F>(
    fetcher: &mut F,
    html: &str,
    base: &str,
    want_details: bool,
    details_remaining: usize,
    policy: &DetailPolicy,
) -> Vec<BookRecord>
where
    F: PageFetcher + Send,
{
    let entries = parse_listing(html, base);

    let mut books = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let mut record = entry.record;

        if want_details && idx < details_remaining {
            if let Some(detail_url) = entry.detail_url.as_deref() {
                debug!("fetching details for '{}' from {}", record.title, detail_url);
                tokio::time::sleep(policy.request_delay).await;

                if fetcher.load(detail_url, policy.load_attempts).await {
                    match fetcher.html().await {
                        Ok(page) => {
                            let detail = parse_detail(&page, detail_url);
                            record.description = detail.description;
                            record.upc = detail.upc;
                            record.category = detail.category;
                        }
                        Err(e) => {
                            warn!("could not read detail page {}: {}", detail_url, e);
                        }
                    }
                } else {
                    warn!(
                        "detail page did not load for '{}': {}",
                        record.title, detail_url
                    );
                }

                // Back to the listing before the next entry.
                if let Err(e) = fetcher.back().await {
                    warn!("back-navigation failed after {}: {}", detail_url, e);
                }
                tokio::time::sleep(policy.settle_delay).await;
            } else {
                warn!("no detail link for '{}', skipping enrichment", record.title);
            }
        }

        books.push(record);
    }

    books
}
