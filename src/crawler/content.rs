//! Content-type dispatch for fetched bodies
//!
//! Every fetched body is classified once into a [`ContentKind`] and handled
//! by the matching branch: HTML is parsed for text and links, PDFs are
//! text-extracted and uploaded to blob storage, anything else is skipped.

use crate::blob::{blob_name, BlobStore};
use crate::crawler::fetcher::FetchedBody;
use crate::crawler::parser::parse_html;
use crate::crawler::pdf::extract_pdf;
use crate::crawler::sniff::essence;
use crate::storage::Link;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a fetched body is, decided from its resolved content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// `text/html` or `text/xml`
    Html,
    /// `application/pdf`
    Pdf,
    /// Anything else, by MIME essence
    Other(String),
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Self {
        match essence(content_type).as_str() {
            "text/html" | "text/xml" | "application/xhtml+xml" => ContentKind::Html,
            "application/pdf" => ContentKind::Pdf,
            other => ContentKind::Other(other.to_string()),
        }
    }
}

/// Output of the content processor
#[derive(Debug, Clone, Default)]
pub struct Processed {
    pub title: String,
    pub text: String,
    pub links: Vec<Link>,
    pub metadata: BTreeMap<String, String>,
    /// Public URL of the uploaded original, for binary documents
    pub storage_url: Option<String>,
}

/// Turns fetched bodies into text, links, and metadata
pub struct ContentProcessor {
    blobs: Arc<dyn BlobStore>,
    forum_scheme: String,
}

impl ContentProcessor {
    pub fn new(blobs: Arc<dyn BlobStore>, forum_scheme: &str) -> Self {
        Self {
            blobs,
            forum_scheme: forum_scheme.to_string(),
        }
    }

    /// Processes one fetched body
    ///
    /// Malformed HTML or PDF yields empty text rather than an error. The
    /// only error is a failed blob upload, which leaves the document unsaved.
    pub async fn process(&self, body: &FetchedBody) -> Result<Processed> {
        match ContentKind::from_content_type(&body.content_type) {
            ContentKind::Html => {
                let html = String::from_utf8_lossy(&body.bytes);
                let page = parse_html(&html, &body.url, &self.forum_scheme);
                Ok(Processed {
                    title: page.title,
                    text: page.text,
                    links: page.links,
                    ..Processed::default()
                })
            }
            ContentKind::Pdf => self.process_pdf(body).await,
            ContentKind::Other(kind) => {
                tracing::info!("Skipping unsupported content type {} at {}", kind, body.url);
                Ok(Processed::default())
            }
        }
    }

    async fn process_pdf(&self, body: &FetchedBody) -> Result<Processed> {
        let bytes = body.bytes.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_pdf(&bytes)).await;

        let mut processed = match extracted {
            Ok(Ok(pdf)) => Processed {
                title: pdf.title,
                text: collapse_whitespace(&pdf.text),
                metadata: pdf.metadata,
                ..Processed::default()
            },
            Ok(Err(e)) => {
                tracing::warn!("PDF conversion failed for {}: {}", body.url, e);
                Processed::default()
            }
            Err(e) => {
                tracing::warn!("PDF conversion task failed for {}: {}", body.url, e);
                Processed::default()
            }
        };

        let name = blob_name(&body.hash, &body.url);
        let storage_url = self.blobs.upload(&name, body.bytes.clone()).await?;
        tracing::debug!("Uploaded {} as {}", body.url, storage_url);
        processed.storage_url = Some(storage_url);

        Ok(processed)
    }
}

/// Collapses every whitespace run to a single space and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
