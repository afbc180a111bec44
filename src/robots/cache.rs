//! Per-host robots.txt cache
//!
//! Policies are fetched on the first query for a host and kept for the
//! lifetime of the process. Any failure to fetch yields a permissive policy.

use crate::robots::ParsedRobots;
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Shared cache of robots.txt policies keyed by `host[:port]`
pub struct HostPolicyCache {
    client: Client,
    /// Agent name matched against `User-agent` lines
    agent: String,
    /// Hosts that are checked under a different agent's rules
    agent_overrides: HashMap<String, String>,
    policies: RwLock<HashMap<String, Arc<ParsedRobots>>>,
}

impl HostPolicyCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to fetch robots.txt
    /// * `agent` - Agent name used for rule group selection
    /// * `agent_overrides` - Host to agent name overrides
    pub fn new(client: Client, agent: &str, agent_overrides: HashMap<String, String>) -> Self {
        Self {
            client,
            agent: agent.to_string(),
            agent_overrides,
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Answers whether `url` may be crawled, fetching the host's rules on first use
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(key) = host_key(url) else {
            return true;
        };

        let policy = self.policy_for(&key, url).await;
        let agent = url
            .host_str()
            .and_then(|h| self.agent_overrides.get(h))
            .unwrap_or(&self.agent);

        policy.is_allowed(url.as_str(), agent)
    }

    /// Number of hosts with a cached policy
    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }

    async fn policy_for(&self, key: &str, url: &Url) -> Arc<ParsedRobots> {
        if let Some(policy) = self.policies.read().get(key) {
            return Arc::clone(policy);
        }

        // Fetched without holding the lock; a concurrent first query for the
        // same host may fetch twice and the first insert wins.
        let fetched = Arc::new(self.fetch(url).await);

        let mut policies = self.policies.write();
        Arc::clone(policies.entry(key.to_string()).or_insert(fetched))
    }

    async fn fetch(&self, url: &Url) -> ParsedRobots {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let response = match self.client.get(robots_url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("robots.txt fetch failed for {}: {}", robots_url, e);
                return ParsedRobots::allow_all();
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("robots.txt for {} returned {}", robots_url, status);
            return ParsedRobots::allow_all();
        }

        match response.text().await {
            Ok(body) => {
                tracing::debug!("Cached robots.txt for {}", robots_url);
                ParsedRobots::from_content(&body)
            }
            Err(e) => {
                tracing::debug!("robots.txt body unreadable for {}: {}", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    }
}

fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key_includes_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/a").unwrap();
        assert_eq!(host_key(&url).as_deref(), Some("127.0.0.1:8080"));

        let url = Url::parse("https://www.cs.ubc.ca:443/a").unwrap();
        assert_eq!(host_key(&url).as_deref(), Some("www.cs.ubc.ca"));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_open() {
        let cache = HostPolicyCache::new(Client::new(), "ExamBot", HashMap::new());
        // Port 9 (discard) is closed on test machines
        let url = Url::parse("http://127.0.0.1:9/~foo/exam.pdf").unwrap();
        assert!(cache.is_allowed(&url).await);
        assert_eq!(cache.len(), 1);
    }
}
