//! Exam Crawler: a focused crawler for course archives
//!
//! This crate implements a long-running crawler that discovers HTML pages and
//! PDF exam files across a fixed set of university hosts, a forum service
//! reached through a virtual URL scheme, and web-archive snapshots. Fetched
//! documents are content-addressed and kept in a SQLite store.

pub mod archive;
pub mod blob;
pub mod config;
pub mod crawler;
pub mod forum;
pub mod frontier;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Forum error for {url}: {message}")]
    Forum { url: String, message: String },

    #[error("Blob upload failed for {name}: {message}")]
    Blob { name: String, message: String },

    #[error("Seen filter error: {0}")]
    Filter(String),

    #[error("Archive query failed: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The frontier has no live entries right now. Retryable.
    #[error("No more work in the frontier")]
    NoMoreWork,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL '{url}': {source}")]
    Parse {
        url: String,
        source: ::url::ParseError,
    },
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Crawler};
pub use frontier::{Frontier, SeenFilter};
pub use storage::{Document, FrontierEntry, Link};
pub use url::{canonicalize, expand_url, Validator};
