//! Data models for scraped books.

mod book;

pub use book::{rating_from_class, BookRecord};
