//! Client for the forum service behind the virtual URL scheme
//!
//! A forum URL such as `piazza://class/abc` is fetched as
//! `<base-url>/class/abc` with the session token, and the returned HTML is
//! treated like any other page.

use crate::config::ForumConfig;
use crate::crawler::{read_limited, LimitedBody};
use crate::{ConfigError, CrawlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

#[async_trait]
pub trait ForumClient: Send + Sync {
    /// Fetches the HTML rendering of a forum URL, keeping at most `limit` bytes
    async fn fetch_html(&self, url: &Url, limit: usize) -> Result<LimitedBody>;
}

/// Builds the forum client, or a disabled one when no forum is configured
pub fn from_config(
    config: Option<&ForumConfig>,
    client: Client,
) -> std::result::Result<Arc<dyn ForumClient>, ConfigError> {
    let Some(config) = config else {
        return Ok(Arc::new(DisabledForum));
    };

    let token = match (&config.token, &config.token_env) {
        (Some(token), _) => token.clone(),
        (None, Some(var)) => std::env::var(var).map_err(|_| {
            ConfigError::Validation(format!("forum token variable {} is not set", var))
        })?,
        (None, None) => {
            return Err(ConfigError::Validation(
                "forum requires either token or token-env".to_string(),
            ))
        }
    };

    Ok(Arc::new(SessionForumClient::new(
        client,
        &config.base_url,
        token,
    )))
}

/// Authenticated HTTP session against the forum's web frontend
pub struct SessionForumClient {
    client: Client,
    base_url: String,
    token: String,
}

impl SessionForumClient {
    pub fn new(client: Client, base_url: &str, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Maps `scheme://host/path?query` onto the service base URL
    fn target(&self, url: &Url) -> String {
        let mut target = self.base_url.clone();
        if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
            target.push('/');
            target.push_str(host);
        }
        let path = url.path();
        if path.is_empty() {
            target.push('/');
        } else {
            target.push_str(path);
        }
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        target
    }
}

#[async_trait]
impl ForumClient for SessionForumClient {
    async fn fetch_html(&self, url: &Url, limit: usize) -> Result<LimitedBody> {
        let target = self.target(url);

        let response = self
            .client
            .get(&target)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| CrawlError::Http {
                url: target.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Forum {
                url: url.to_string(),
                message: format!("session request returned {}", status),
            });
        }

        read_limited(response, limit, &target).await
    }
}

/// Used when no forum session is configured; every fetch fails
pub struct DisabledForum;

#[async_trait]
impl ForumClient for DisabledForum {
    async fn fetch_html(&self, url: &Url, _limit: usize) -> Result<LimitedBody> {
        Err(CrawlError::Forum {
            url: url.to_string(),
            message: "no forum session configured".to_string(),
        })
    }
}
