//! Optional on-disk cache of extracted documents.
//!
//! Entries are keyed by absolute path and only trusted while the file's
//! modification time and size are unchanged.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::schema::{SchemaError, init_schema};
use super::types::{DocumentRecord, RawLink};
use crate::vault::FileStats;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cache schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("cache entry could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What the cache stores for one file: the record and its unresolved links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub record: DocumentRecord,
    pub links: Vec<RawLink>,
}

/// A swappable store of extracted documents.
pub trait MetadataCache: Send + Sync {
    fn get(&self, path: &Path) -> Result<Option<CachedDocument>, CacheError>;
    fn set(&self, path: &Path, document: &CachedDocument) -> Result<(), CacheError>;
    fn delete(&self, path: &Path) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
    /// Whether the entry for `path` was stored for a file with these stats.
    fn is_valid(&self, path: &Path, stats: &FileStats) -> Result<bool, CacheError>;
}

/// SQLite-backed [`MetadataCache`].
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open or create a cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create an in-memory cache (for testing).
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        let count: i64 =
            self.conn.lock().query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl MetadataCache for SqliteCache {
    fn get(&self, path: &Path) -> Result<Option<CachedDocument>, CacheError> {
        let data: Option<String> = self
            .conn
            .lock()
            .query_row("SELECT data FROM documents WHERE path = ?1", [key(path)], |row| row.get(0))
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set(&self, path: &Path, document: &CachedDocument) -> Result<(), CacheError> {
        let data = serde_json::to_string(document)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO documents (path, modified_ms, size, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key(path),
                document.record.modified.timestamp_millis(),
                i64::try_from(document.record.size).unwrap_or(i64::MAX),
                data
            ],
        )?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), CacheError> {
        self.conn.lock().execute("DELETE FROM documents WHERE path = ?1", [key(path)])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.conn.lock().execute("DELETE FROM documents", [])?;
        Ok(())
    }

    fn is_valid(&self, path: &Path, stats: &FileStats) -> Result<bool, CacheError> {
        let row: Option<(i64, i64)> = self
            .conn
            .lock()
            .query_row(
                "SELECT modified_ms, size FROM documents WHERE path = ?1",
                [key(path)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.is_some_and(|(modified_ms, size)| {
            modified_ms == stats.modified.timestamp_millis()
                && u64::try_from(size).is_ok_and(|s| s == stats.size)
        }))
    }
}
