//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- URLs awaiting (or having completed) a fetch attempt
CREATE TABLE IF NOT EXISTS frontier (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    source_hash TEXT NOT NULL DEFAULT '',
    score INTEGER NOT NULL DEFAULT 0,
    -- Uniform key fixed at insert; batches are read from a random pivot
    random_key INTEGER NOT NULL DEFAULT 0,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at TEXT NOT NULL,
    removed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_frontier_live_key ON frontier(random_key)
    WHERE removed_at IS NULL;

-- Fetched documents keyed by SHA-256 of their bytes
CREATE TABLE IF NOT EXISTS documents (
    hash TEXT PRIMARY KEY,
    source_url TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    storage_url TEXT,
    title TEXT NOT NULL DEFAULT '',
    url_title TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    links TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    referer_hash TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source_url);

-- Seen-set bitmaps flushed at shutdown
CREATE TABLE IF NOT EXISTS filter_snapshots (
    name TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
