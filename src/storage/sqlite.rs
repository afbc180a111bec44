//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Document, FrontierEntry};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
///
/// A single connection guarded by a mutex; each call holds the lock only for
/// the duration of its statements.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

const FRONTIER_COLUMNS: &str =
    "url, title, source_hash, score, attempts, created_at, removed_at";

/// Random keys are drawn from `0..=RANDOM_KEY_MASK`
const RANDOM_KEY_MASK: i64 = 0xF_FFFF;

/// Rows read per requested entry, so low scores can win within a batch
const SAMPLE_WINDOW: usize = 4;

const SAMPLE_FROM_PIVOT: &str = "SELECT url, title, source_hash, score, attempts, created_at, removed_at
     FROM frontier
     WHERE removed_at IS NULL AND random_key >= ?1
     ORDER BY random_key
     LIMIT ?2";

const SAMPLE_BEFORE_PIVOT: &str = "SELECT url, title, source_hash, score, attempts, created_at, removed_at
     FROM frontier
     WHERE removed_at IS NULL AND random_key < ?1
     ORDER BY random_key
     LIMIT ?2";

const DOCUMENT_COLUMNS: &str = "hash, source_url, fetched_at, status_code, content_type, \
     storage_url, title, url_title, text, links, metadata, referer_hash";

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn frontier_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierEntry> {
    Ok(FrontierEntry {
        url: row.get(0)?,
        title: row.get(1)?,
        source_hash: row.get(2)?,
        score: row.get(3)?,
        attempts: row.get(4)?,
        created_at: row.get(5)?,
        removed_at: row.get(6)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let links: String = row.get(9)?;
    let metadata: String = row.get(10)?;

    Ok(Document {
        hash: row.get(0)?,
        source_url: row.get(1)?,
        fetched_at: row.get(2)?,
        status_code: row.get(3)?,
        content_type: row.get(4)?,
        storage_url: row.get(5)?,
        title: row.get(6)?,
        url_title: row.get(7)?,
        text: row.get(8)?,
        links: serde_json::from_str(&links)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?,
        referer_hash: row.get(11)?,
    })
}

fn count(conn: &Connection, sql: &str) -> StorageResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

impl Storage for SqliteStorage {
    // ===== Frontier =====

    fn insert_frontier(&self, entries: &[FrontierEntry]) -> StorageResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO frontier (url, title, source_hash, score, random_key, attempts, created_at)
                 VALUES (?1, ?2, ?3, ?4, RANDOM() & ?6, 0, ?5)
                 ON CONFLICT(url) DO NOTHING",
            )?;
            for entry in entries {
                added += stmt.execute(params![
                    entry.url,
                    entry.title,
                    entry.source_hash,
                    entry.score,
                    entry.created_at,
                    RANDOM_KEY_MASK
                ])?;
            }
        }
        tx.commit()?;

        Ok(added)
    }

    fn revive_frontier(&self, entry: &FrontierEntry) -> StorageResult<()> {
        self.conn.lock().execute(
            "INSERT INTO frontier (url, title, source_hash, score, random_key, attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, RANDOM() & ?6, 0, ?5)
             ON CONFLICT(url) DO UPDATE SET
                removed_at = NULL,
                attempts = 0,
                last_error = NULL,
                title = excluded.title,
                source_hash = excluded.source_hash",
            params![
                entry.url,
                entry.title,
                entry.source_hash,
                entry.score,
                entry.created_at,
                RANDOM_KEY_MASK
            ],
        )?;
        Ok(())
    }

    fn sample_frontier(&self, limit: usize, score_bias: i64) -> StorageResult<Vec<FrontierEntry>> {
        let window = limit.max(1) * SAMPLE_WINDOW;

        let entries = {
            let conn = self.conn.lock();
            let pivot: i64 =
                conn.query_row("SELECT RANDOM() & ?1", params![RANDOM_KEY_MASK], |row| row.get(0))?;

            let mut entries = conn
                .prepare_cached(SAMPLE_FROM_PIVOT)?
                .query_map(params![pivot, window as i64], frontier_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            if entries.len() < window {
                let rest = (window - entries.len()) as i64;
                let wrapped = conn
                    .prepare_cached(SAMPLE_BEFORE_PIVOT)?
                    .query_map(params![pivot, rest], frontier_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                entries.extend(wrapped);
            }
            entries
        };

        // Window position stands in for the random key, scaled to 0..1000
        let n = entries.len().max(1) as i64;
        let mut ranked: Vec<(i64, FrontierEntry)> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| (i as i64 * 1000 / n + entry.score * score_bias, entry))
            .collect();
        ranked.sort_by_key(|(key, _)| *key);

        Ok(ranked.into_iter().take(limit).map(|(_, entry)| entry).collect())
    }

    fn get_frontier(&self, url: &str) -> StorageResult<Option<FrontierEntry>> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                &format!("SELECT {FRONTIER_COLUMNS} FROM frontier WHERE url = ?1"),
                params![url],
                frontier_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn is_live(&self, url: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let live = conn
            .query_row(
                "SELECT 1 FROM frontier WHERE url = ?1 AND removed_at IS NULL",
                params![url],
                |_| Ok(()),
            )
            .optional()?;
        Ok(live.is_some())
    }

    fn mark_removed(&self, url: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.lock().execute(
            "UPDATE frontier SET removed_at = ?2 WHERE url = ?1 AND removed_at IS NULL",
            params![url, now],
        )?;
        Ok(())
    }

    fn record_failure(&self, url: &str, error: &str, max_attempts: u32) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE frontier SET
                attempts = attempts + 1,
                last_error = ?2,
                removed_at = CASE WHEN attempts + 1 >= ?3 THEN ?4 ELSE NULL END
             WHERE url = ?1 AND removed_at IS NULL",
            params![url, error, max_attempts, now],
        )?;

        let retired: Option<bool> = conn
            .query_row(
                "SELECT removed_at IS NOT NULL FROM frontier WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(retired.unwrap_or(false))
    }

    fn for_each_frontier_url(&self, f: &mut dyn FnMut(&str)) -> StorageResult<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT url FROM frontier")?;
        let mut rows = stmt.query([])?;
        let mut n = 0;
        while let Some(row) = rows.next()? {
            let url: String = row.get(0)?;
            f(&url);
            n += 1;
        }
        Ok(n)
    }

    fn live_count(&self) -> StorageResult<u64> {
        count(
            &self.conn.lock(),
            "SELECT COUNT(*) FROM frontier WHERE removed_at IS NULL",
        )
    }

    fn frontier_count(&self) -> StorageResult<u64> {
        count(&self.conn.lock(), "SELECT COUNT(*) FROM frontier")
    }

    // ===== Documents =====

    fn save_document(&self, document: &Document) -> StorageResult<bool> {
        let links = serde_json::to_string(&document.links)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let metadata = serde_json::to_string(&document.metadata)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let inserted = self.conn.lock().execute(
            &format!(
                "INSERT INTO documents ({DOCUMENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(hash) DO NOTHING"
            ),
            params![
                document.hash,
                document.source_url,
                document.fetched_at,
                document.status_code,
                document.content_type,
                document.storage_url,
                document.title,
                document.url_title,
                document.text,
                links,
                metadata,
                document.referer_hash
            ],
        )?;

        Ok(inserted > 0)
    }

    fn has_document(&self, hash: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM documents WHERE hash = ?1",
                params![hash],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_document(&self, hash: &str) -> StorageResult<Option<Document>> {
        let conn = self.conn.lock();
        let document = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE hash = ?1"),
                params![hash],
                document_from_row,
            )
            .optional()?;
        Ok(document)
    }

    fn for_each_document_hash(&self, f: &mut dyn FnMut(&str)) -> StorageResult<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT hash FROM documents")?;
        let mut rows = stmt.query([])?;
        let mut n = 0;
        while let Some(row) = rows.next()? {
            let hash: String = row.get(0)?;
            f(&hash);
            n += 1;
        }
        Ok(n)
    }

    fn document_count(&self) -> StorageResult<u64> {
        count(&self.conn.lock(), "SELECT COUNT(*) FROM documents")
    }

    // ===== Seen-set snapshots =====

    fn save_filter_snapshot(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.lock().execute(
            "INSERT INTO filter_snapshots (name, data, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data, saved_at = excluded.saved_at",
            params![name, data, now],
        )?;
        Ok(())
    }

    fn load_filter_snapshot(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let data = conn
            .query_row(
                "SELECT data FROM filter_snapshots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }
}
