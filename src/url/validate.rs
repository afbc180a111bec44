use crate::config::Config;
use crate::robots::HostPolicyCache;
use crate::url::canonicalize;
use crate::{ConfigError, UrlError};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Decides whether a URL is eligible for crawling
///
/// A URL is accepted when, in order:
///
/// 1. its scheme is http, https, or the forum scheme (forum URLs always pass)
/// 2. its host is on the allow-list, and matches one of that host's
///    whitelist patterns if it has any
/// 3. its path is more than just `/`
/// 4. it matches none of the blacklist patterns
/// 5. the host's robots.txt permits it
pub struct Validator {
    forum_scheme: String,
    hosts: HashMap<String, Vec<Regex>>,
    blacklist: Vec<Regex>,
    policies: Arc<HostPolicyCache>,
}

impl Validator {
    /// Compiles the host list and blacklist from configuration
    pub fn from_config(config: &Config, policies: Arc<HostPolicyCache>) -> Result<Self, ConfigError> {
        let mut hosts = HashMap::new();
        for entry in &config.hosts {
            let whitelist = compile_all(&entry.whitelist)?;
            hosts.insert(entry.name.to_lowercase(), whitelist);
        }

        Ok(Self {
            forum_scheme: config.forum_scheme().to_string(),
            hosts,
            blacklist: compile_all(&config.blacklist)?,
            policies,
        })
    }

    /// Parses and validates a URL string
    ///
    /// Returns `Err` only when the string is not a URL; every policy
    /// rejection is `Ok(false)`.
    pub async fn validate(&self, url: &str) -> Result<bool, UrlError> {
        let url = canonicalize(url)?;
        Ok(self.validate_url(&url).await)
    }

    /// Validates an already canonical URL
    pub async fn validate_url(&self, url: &Url) -> bool {
        match url.scheme() {
            "http" | "https" => {}
            scheme if scheme == self.forum_scheme => return true,
            scheme => {
                tracing::trace!("Rejected {}: scheme {}", url, scheme);
                return false;
            }
        }

        let Some(host) = url.host_str() else {
            return false;
        };

        let lowered = url.as_str().to_lowercase();

        let Some(whitelist) = self.hosts.get(host) else {
            tracing::trace!("Rejected {}: host not allowed", url);
            return false;
        };

        if !whitelist.is_empty() && !whitelist.iter().any(|re| re.is_match(&lowered)) {
            tracing::trace!("Rejected {}: not on host whitelist", url);
            return false;
        }

        if url.path().len() <= 1 {
            tracing::trace!("Rejected {}: root path", url);
            return false;
        }

        if let Some(re) = self.blacklist.iter().find(|re| re.is_match(&lowered)) {
            tracing::trace!("Rejected {}: blacklisted by {}", url, re.as_str());
            return false;
        }

        if !self.policies.is_allowed(url).await {
            tracing::debug!("Rejected {}: disallowed by robots.txt", url);
            return false;
        }

        true
    }

    /// True for URLs on the forum's virtual scheme
    pub fn is_forum(&self, url: &Url) -> bool {
        url.scheme() == self.forum_scheme
    }

    /// Forum roots are revisited every run regardless of the seen-set
    pub fn is_always_visit(&self, url: &Url) -> bool {
        self.is_forum(url) && url.path().len() <= 1
    }

    pub fn forum_scheme(&self) -> &str {
        &self.forum_scheme
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}
