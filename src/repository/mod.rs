//! Repository layer for SQLite persistence.

mod book;

pub use book::{dedup_key, BookRepository, DedupKey};

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record rejected: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a connection to the database, creating the parent directory on
/// first use.
pub(crate) fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}
