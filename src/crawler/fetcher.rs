//! HTTP and forum fetching
//!
//! This module handles every outbound document request, including:
//! - Building the shared HTTP client with the crawler's user agent
//! - Streaming bodies with a hard size limit
//! - Hashing the stored bytes for content identity
//! - Resolving the content type from sniffed bytes and the declared header
//! - Routing forum URLs to the forum session client

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::sniff::{detect_content_type, resolve_content_type, SNIFF_LEN};
use crate::forum::ForumClient;
use crate::{CrawlError, Result};
use reqwest::{redirect::Policy, Client, Response};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const FORUM_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// A fetched body with its identity and resolved type
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    /// Resolved MIME type
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Lowercase hex SHA-256 of `bytes`
    pub hash: String,
    /// The body was cut at the size limit
    pub truncated: bool,
}

impl FetchedBody {
    fn from_bytes(url: Url, status: u16, declared: Option<&str>, bytes: Vec<u8>, truncated: bool) -> Self {
        let sniffed = detect_content_type(&bytes[..bytes.len().min(SNIFF_LEN)]);
        Self {
            url,
            status,
            content_type: resolve_content_type(sniffed, declared),
            hash: hex::encode(Sha256::digest(&bytes)),
            bytes,
            truncated,
        }
    }
}

/// Formats the user agent as `Name/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds the HTTP client shared by fetching, robots, blobs, and archive lookups
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Timeouts are taken from the crawler section
///
/// # Example
///
/// ```no_run
/// use exam_crawler::config::{CrawlerConfig, UserAgentConfig};
/// use exam_crawler::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "ExamCrawler".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(user_agent))
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches documents over HTTP or through the forum session
pub struct Fetcher {
    client: Client,
    forum: Arc<dyn ForumClient>,
    forum_scheme: String,
    max_body_bytes: u64,
}

impl Fetcher {
    pub fn new(
        client: Client,
        forum: Arc<dyn ForumClient>,
        forum_scheme: &str,
        max_body_bytes: u64,
    ) -> Self {
        Self {
            client,
            forum,
            forum_scheme: forum_scheme.to_string(),
            max_body_bytes,
        }
    }

    /// Fetches one URL
    ///
    /// Any HTTP status is a successful fetch; only transport failures are
    /// errors. Bodies longer than the limit are cut, not rejected.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedBody> {
        if url.scheme() == self.forum_scheme {
            return self.fetch_forum(url).await;
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| CrawlError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let declared = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = read_limited(response, self.body_limit(), url.as_str()).await?;

        Ok(FetchedBody::from_bytes(
            final_url,
            status,
            declared.as_deref(),
            body.bytes,
            body.truncated,
        ))
    }

    fn body_limit(&self) -> usize {
        usize::try_from(self.max_body_bytes).unwrap_or(usize::MAX)
    }

    async fn fetch_forum(&self, url: &Url) -> Result<FetchedBody> {
        let page = self.forum.fetch_html(url, self.body_limit()).await?;
        Ok(FetchedBody::from_bytes(
            url.clone(),
            200,
            Some(FORUM_CONTENT_TYPE),
            page.bytes,
            page.truncated,
        ))
    }
}

/// Response bytes read up to a limit
#[derive(Debug, Clone, Default)]
pub struct LimitedBody {
    pub bytes: Vec<u8>,
    /// The response had more than `limit` bytes
    pub truncated: bool,
}

/// Streams a response body, keeping at most `limit` bytes
///
/// The rest of the body is never read.
pub(crate) async fn read_limited(
    mut response: Response,
    limit: usize,
    url: &str,
) -> Result<LimitedBody> {
    let mut body = LimitedBody::default();

    while let Some(chunk) = response.chunk().await.map_err(|source| CrawlError::Http {
        url: url.to_string(),
        source,
    })? {
        let room = limit - body.bytes.len();
        if chunk.len() > room {
            body.bytes.extend_from_slice(&chunk[..room]);
            body.truncated = true;
            break;
        }
        body.bytes.extend_from_slice(&chunk);
    }

    if body.truncated {
        tracing::warn!("Body of {} cut at {} bytes", url, limit);
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::{DisabledForum, SessionForumClient};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn fetcher(max_body_bytes: u64) -> Fetcher {
        let client = build_http_client(&create_test_config(), &CrawlerConfig::default()).unwrap();
        Fetcher::new(client, Arc::new(DisabledForum), "piazza", max_body_bytes)
    }

    #[test]
    fn test_user_agent_format() {
        assert_eq!(
            user_agent_string(&create_test_config()),
            "TestCrawler/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[tokio::test]
    async fn test_fetch_hashes_and_sniffs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_string("<html><body>hi</body></html>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let body = fetcher(1024).fetch(&url).await.unwrap();

        assert_eq!(body.status, 200);
        assert_eq!(body.content_type, "text/html; charset=utf-8");
        assert_eq!(
            body.hash,
            hex::encode(Sha256::digest(b"<html><body>hi</body></html>"))
        );
        assert!(!body.truncated);
    }

    #[tokio::test]
    async fn test_fetch_truncates_at_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 4096]))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/big.txt", server.uri())).unwrap();
        let body = fetcher(100).fetch(&url).await.unwrap();

        assert_eq!(body.bytes.len(), 100);
        assert!(body.truncated);
        assert_eq!(body.hash, hex::encode(Sha256::digest(vec![b'a'; 100])));
    }

    #[tokio::test]
    async fn test_error_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let body = fetcher(1024).fetch(&url).await.unwrap();
        assert_eq!(body.status, 404);
    }

    #[tokio::test]
    async fn test_forum_body_is_cut_at_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/class/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 4096]))
            .mount(&server)
            .await;

        let client = build_http_client(&create_test_config(), &CrawlerConfig::default()).unwrap();
        let forum = SessionForumClient::new(client.clone(), &server.uri(), "secret".into());
        let fetcher = Fetcher::new(client, Arc::new(forum), "piazza", 100);

        let url = Url::parse("piazza://class/big").unwrap();
        let body = fetcher.fetch(&url).await.unwrap();

        assert_eq!(body.bytes.len(), 100);
        assert!(body.truncated);
        assert_eq!(body.hash, hex::encode(Sha256::digest(vec![b'a'; 100])));
    }

    #[tokio::test]
    async fn test_forum_without_session_fails() {
        let url = Url::parse("piazza://class/abc").unwrap();
        assert!(fetcher(1024).fetch(&url).await.is_err());
    }
}
