//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - The durable frontier of URLs awaiting a fetch
//! - Content-addressed documents
//! - Seen-set snapshots flushed at shutdown

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Opens (creating if needed) the storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One URL awaiting, or having completed, a fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    pub url: String,
    /// Anchor text of the link that led here
    pub title: String,
    /// Hash of the document that discovered this URL
    pub source_hash: String,
    /// Lower scores are sampled first
    pub score: i64,
    pub attempts: u32,
    pub created_at: String,
    pub removed_at: Option<String>,
}

impl FrontierEntry {
    pub fn new(url: impl Into<String>, title: impl Into<String>, source_hash: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            source_hash: source_hash.into(),
            score: 0,
            attempts: 0,
            created_at: Utc::now().to_rfc3339(),
            removed_at: None,
        }
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }
}

/// An outgoing reference discovered inside a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

/// A fetched resource, identified by the SHA-256 of its bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub hash: String,
    pub source_url: String,
    pub fetched_at: String,
    pub status_code: u16,
    pub content_type: String,
    /// Public blob URL for uploaded binaries such as PDFs
    pub storage_url: Option<String>,
    pub title: String,
    /// Anchor text of the link the document was reached through
    pub url_title: String,
    pub text: String,
    pub links: Vec<Link>,
    /// Extra metadata such as PDF author and page count
    pub metadata: BTreeMap<String, String>,
    pub referer_hash: String,
}
