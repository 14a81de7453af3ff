//! Book record model and the rating scale.

use serde::{Deserialize, Serialize};

/// One scraped book.
///
/// Listing-page fields are always populated (a missing field is logged and
/// left empty or `None`); the detail fields `description`, `upc` and
/// `category` are set together by a successful detail-page fetch and stay
/// `None` on basic-only records. The extraction timestamp is assigned by the
/// store at insert time, not carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub price: Option<f64>,
    pub availability: String,
    pub rating: Option<u8>,
    pub image_url: String,
    pub description: Option<String>,
    pub upc: Option<String>,
    pub category: Option<String>,
}

impl BookRecord {
    /// Create a basic record with detail fields unset.
    pub fn basic(
        title: String,
        price: Option<f64>,
        availability: String,
        rating: Option<u8>,
        image_url: String,
    ) -> Self {
        Self {
            title,
            price,
            availability,
            rating,
            image_url,
            description: None,
            upc: None,
            category: None,
        }
    }

    /// True when the record carries all three detail-page fields.
    pub fn has_full_details(&self) -> bool {
        self.description.is_some() && self.upc.is_some() && self.category.is_some()
    }
}

/// Ordinal rating labels as they appear in the site's CSS classes.
const RATING_SCALE: [(&str, u8); 5] = [
    ("One", 1),
    ("Two", 2),
    ("Three", 3),
    ("Four", 4),
    ("Five", 5),
];

/// Map a star-rating CSS class attribute (e.g. "star-rating Three") to a
/// numeric rating. Unrecognized labels yield `None` rather than an error.
pub fn rating_from_class(classes: &str) -> Option<u8> {
    for token in classes.split_whitespace() {
        for (label, value) in RATING_SCALE {
            if token == label {
                return Some(value);
            }
        }
    }
    None
}
