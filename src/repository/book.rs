//! Duplicate-safe book store backed by SQLite.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use super::{Result, RepositoryError};
use crate::models::BookRecord;

/// Key used to decide whether a record already exists.
///
/// UPC takes precedence when present; the title is only consulted for
/// records without one. A record with neither is rejected before this
/// decision by the non-empty-title check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupKey<'a> {
    Upc(&'a str),
    Title(&'a str),
}

/// Pure duplicate-check precedence: UPC first, title fallback.
pub fn dedup_key<'a>(upc: Option<&'a str>, title: &'a str) -> DedupKey<'a> {
    match upc.filter(|u| !u.is_empty()) {
        Some(upc) => DedupKey::Upc(upc),
        None => DedupKey::Title(title),
    }
}

/// SQLite-backed book repository. Opens a connection per operation.
pub struct BookRepository {
    db_path: PathBuf,
}

impl BookRepository {
    /// Create a repository, initializing the schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                price REAL,
                availability TEXT,
                rating INTEGER,
                image_url TEXT,
                description TEXT,
                upc TEXT UNIQUE,
                category TEXT,
                extracted_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_books_title
                ON books(title);
            "#,
        )?;
        debug!("books table ready at {}", self.db_path.display());
        Ok(())
    }

    /// Check whether a record with the given key is already stored.
    fn exists(&self, conn: &Connection, key: DedupKey<'_>) -> Result<bool> {
        let found = match key {
            DedupKey::Upc(upc) => conn
                .query_row(
                    "SELECT 1 FROM books WHERE upc = ?1 LIMIT 1",
                    params![upc],
                    |_| Ok(()),
                )
                .optional()?,
            DedupKey::Title(title) => conn
                .query_row(
                    "SELECT 1 FROM books WHERE title = ?1 LIMIT 1",
                    params![title],
                    |_| Ok(()),
                )
                .optional()?,
        };
        Ok(found.is_some())
    }

    /// Insert a record unless it is a duplicate.
    ///
    /// Returns `Ok(true)` when a row was written, `Ok(false)` for
    /// duplicates. A UNIQUE violation from a racing writer is resolved by
    /// the constraint and also reported as a duplicate, not an error. The
    /// extraction timestamp is assigned here, at persistence time.
    pub fn insert(&self, book: &BookRecord) -> Result<bool> {
        if book.title.is_empty() {
            return Err(RepositoryError::InvalidRecord(
                "cannot insert a book without a title".to_string(),
            ));
        }

        let conn = self.connect()?;
        let key = dedup_key(book.upc.as_deref(), &book.title);
        if self.exists(&conn, key)? {
            match key {
                DedupKey::Upc(upc) => {
                    info!("duplicate book (UPC {}), skipping: {}", upc, book.title)
                }
                DedupKey::Title(_) => info!("duplicate book (by title), skipping: {}", book.title),
            }
            return Ok(false);
        }

        let extracted_at = Utc::now().to_rfc3339();
        let result = conn.execute(
            r#"
            INSERT INTO books
                (title, price, availability, rating, image_url,
                 description, upc, category, extracted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                book.title,
                book.price,
                book.availability,
                book.rating,
                book.image_url,
                book.description,
                book.upc,
                book.category,
                extracted_at,
            ],
        );

        match result {
            Ok(_) => {
                info!("book inserted: {}", book.title);
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                warn!(
                    "constraint violation inserting '{}' ({}), treating as duplicate",
                    book.title,
                    msg.unwrap_or_default()
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Total number of stored books.
    pub fn count(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count)
    }
}
