//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Document, FrontierEntry};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method takes `&self`; implementations serialize access internally
/// so one instance can be shared by all workers.
pub trait Storage: Send + Sync {
    // ===== Frontier =====

    /// Inserts entries, silently skipping any URL already present
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn insert_frontier(&self, entries: &[FrontierEntry]) -> StorageResult<usize>;

    /// Inserts an entry or makes an existing one live again
    fn revive_frontier(&self, entry: &FrontierEntry) -> StorageResult<()>;

    /// Draws up to `limit` live entries at random, biased toward low scores
    fn sample_frontier(&self, limit: usize, score_bias: i64) -> StorageResult<Vec<FrontierEntry>>;

    /// Looks up a frontier entry by URL, live or removed
    fn get_frontier(&self, url: &str) -> StorageResult<Option<FrontierEntry>>;

    /// True if the URL has a live frontier entry
    fn is_live(&self, url: &str) -> StorageResult<bool>;

    /// Marks an entry as visited or discarded
    fn mark_removed(&self, url: &str) -> StorageResult<()>;

    /// Records a transient failure against an entry
    ///
    /// # Returns
    ///
    /// `true` if the entry has now used up `max_attempts` and was removed
    fn record_failure(&self, url: &str, error: &str, max_attempts: u32) -> StorageResult<bool>;

    /// Calls `f` for every frontier URL, including removed entries
    fn for_each_frontier_url(&self, f: &mut dyn FnMut(&str)) -> StorageResult<usize>;

    /// Number of live entries
    fn live_count(&self) -> StorageResult<u64>;

    /// Number of entries ever inserted
    fn frontier_count(&self) -> StorageResult<u64>;

    // ===== Documents =====

    /// Stores a document unless one with the same hash exists
    ///
    /// # Returns
    ///
    /// `true` if a new row was written
    fn save_document(&self, document: &Document) -> StorageResult<bool>;

    fn has_document(&self, hash: &str) -> StorageResult<bool>;

    fn get_document(&self, hash: &str) -> StorageResult<Option<Document>>;

    /// Calls `f` for every stored content hash
    fn for_each_document_hash(&self, f: &mut dyn FnMut(&str)) -> StorageResult<usize>;

    fn document_count(&self) -> StorageResult<u64>;

    // ===== Seen-set snapshots =====

    fn save_filter_snapshot(&self, name: &str, data: &[u8]) -> StorageResult<()>;

    fn load_filter_snapshot(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;
}
