//! Crawler module for document fetching and processing
//!
//! This module contains the crawl pipeline, including:
//! - HTTP and forum fetching with a body size limit
//! - Content type sniffing and dispatch
//! - HTML parsing and link extraction
//! - PDF text extraction
//! - The concurrent worker pool

mod content;
mod fetcher;
mod parser;
mod pdf;
mod scheduler;
mod sniff;

pub use content::{collapse_whitespace, ContentKind, ContentProcessor, Processed};
pub use fetcher::{build_http_client, user_agent_string, FetchedBody, Fetcher, LimitedBody};
pub(crate) use fetcher::read_limited;
pub use parser::{parse_html, ParsedPage};
pub use pdf::{extract_pdf, PdfContent};
pub use scheduler::{run_crawl, Crawler, Outcome, WorkerPhase};
pub use sniff::{detect_content_type, essence, resolve_content_type};
