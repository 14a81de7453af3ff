//! Bookscrape - browser-driven book catalog scraper.
//!
//! Extracts book listings from a paginated catalog site with a headless
//! Chromium session and persists them into a local SQLite database with
//! duplicate suppression.

pub mod browser;
pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrape;
