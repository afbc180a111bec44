//! Web-archive seeding
//!
//! Queries a CDX search endpoint for every archived URL under a prefix and
//! submits the results to the frontier without ancestor expansion. Results
//! are paged with CDX resume keys and each page is queued as it arrives.

use crate::config::ArchiveConfig;
use crate::frontier::Frontier;
use crate::storage::Link;
use crate::{CrawlError, Result};
use reqwest::Client;
use std::time::Duration;

/// One page of CDX results
#[derive(Debug, Default, PartialEq)]
pub struct CdxPage {
    pub urls: Vec<String>,
    /// Passed back as `resumeKey` to get the next page
    pub resume_key: Option<String>,
}

/// Client for a CDX search API
pub struct ArchiveClient {
    client: Client,
    endpoint: String,
    page_size: usize,
    timeout: Duration,
}

impl ArchiveClient {
    pub fn new(client: Client, config: &ArchiveConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            page_size: config.page_size.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Fetches one page of distinct archived URLs starting with `prefix`
    pub async fn snapshot_page(&self, prefix: &str, resume_key: Option<&str>) -> Result<CdxPage> {
        let page_size = self.page_size.to_string();
        let mut query = vec![
            ("url", prefix),
            ("matchType", "prefix"),
            ("output", "json"),
            ("fl", "original"),
            ("collapse", "urlkey"),
            ("limit", page_size.as_str()),
            ("showResumeKey", "true"),
        ];
        if let Some(key) = resume_key {
            query.push(("resumeKey", key));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| CrawlError::Http {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Archive(format!(
                "{} returned {} for prefix {}",
                self.endpoint, status, prefix
            )));
        }

        parse_cdx(&response.text().await?)
    }

    /// Queues every archived URL under `prefix`, page by page
    ///
    /// A failed page ends this prefix; pages already queued stay queued.
    pub async fn seed_prefix(&self, frontier: &Frontier, prefix: &str) -> Result<usize> {
        let mut added = 0;
        let mut seen_urls = 0;
        let mut resume_key: Option<String> = None;

        loop {
            let page = self.snapshot_page(prefix, resume_key.as_deref()).await?;
            seen_urls += page.urls.len();

            let links: Vec<Link> = page
                .urls
                .into_iter()
                .map(|url| Link {
                    title: String::new(),
                    url,
                })
                .collect();
            added += frontier.add_and_expand(&links, "", false).await?;

            match page.resume_key {
                Some(key) if resume_key.as_deref() != Some(key.as_str()) => resume_key = Some(key),
                _ => break,
            }
        }

        tracing::info!("Archive returned {} URLs for {}", seen_urls, prefix);
        Ok(added)
    }

    /// Seeds the frontier from every prefix; errors are logged per prefix
    ///
    /// # Returns
    ///
    /// The number of new frontier entries
    pub async fn seed(&self, frontier: &Frontier, prefixes: &[String]) -> usize {
        let mut added = 0;

        for prefix in prefixes {
            match self.seed_prefix(frontier, prefix).await {
                Ok(n) => added += n,
                Err(e) => tracing::warn!("Archive seeding stopped for {}: {}", prefix, e),
            }
        }

        added
    }
}

/// Parses CDX JSON output
///
/// A header row comes first, then one row per capture. With resume keys
/// enabled, an empty row separates the captures from a final one-field row
/// holding the key.
fn parse_cdx(body: &str) -> Result<CdxPage> {
    if body.trim().is_empty() {
        return Ok(CdxPage::default());
    }

    let rows: Vec<Vec<String>> =
        serde_json::from_str(body).map_err(|e| CrawlError::Archive(e.to_string()))?;

    let mut page = CdxPage::default();
    let mut rows = rows.into_iter().skip(1);
    while let Some(row) = rows.next() {
        if row.is_empty() {
            page.resume_key = rows.next().and_then(|row| row.into_iter().next());
            break;
        }
        page.urls.extend(row.into_iter().next());
    }

    Ok(page)
}
