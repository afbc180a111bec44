//! URL frontier and seen-set
//!
//! The frontier is the durable table of URLs awaiting a fetch. Candidates
//! pass through the seen-set and the [`Validator`] before they are written,
//! and workers draw random batches of live entries back out.

mod seen;

pub use seen::SeenFilter;

use crate::config::{Config, ScoreEntry};
use crate::storage::{FrontierEntry, Link, Storage};
use crate::url::{canonicalize, expand_url, Validator};
use crate::{ConfigError, CrawlError, Result};
use regex::Regex;
use std::sync::Arc;

/// Sums the weights of score patterns matching a URL
#[derive(Debug, Default)]
pub struct Scorer {
    rules: Vec<(i64, Regex)>,
}

impl Scorer {
    pub fn from_entries(entries: &[ScoreEntry]) -> std::result::Result<Self, ConfigError> {
        let mut rules = Vec::new();
        for entry in entries {
            for pattern in &entry.patterns {
                let re = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                rules.push((entry.weight, re));
            }
        }
        Ok(Self { rules })
    }

    pub fn score(&self, url: &str) -> i64 {
        let lowered = url.to_lowercase();
        self.rules
            .iter()
            .filter(|(_, re)| re.is_match(&lowered))
            .map(|(weight, _)| weight)
            .sum()
    }
}

/// Durable work queue shared by all workers
pub struct Frontier {
    storage: Arc<dyn Storage>,
    seen: Arc<SeenFilter>,
    validator: Arc<Validator>,
    scorer: Scorer,
    insert_chunk: usize,
    score_bias: i64,
}

impl Frontier {
    pub fn new(
        storage: Arc<dyn Storage>,
        seen: Arc<SeenFilter>,
        validator: Arc<Validator>,
        scorer: Scorer,
    ) -> Self {
        Self {
            storage,
            seen,
            validator,
            scorer,
            insert_chunk: 1000,
            score_bias: 0,
        }
    }

    /// Builds a frontier with scoring and chunking taken from configuration
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        seen: Arc<SeenFilter>,
        validator: Arc<Validator>,
    ) -> std::result::Result<Self, ConfigError> {
        let scorer = Scorer::from_entries(&config.scores)?;
        let mut frontier = Self::new(storage, seen, validator, scorer);
        frontier.insert_chunk = config.crawler.insert_chunk;
        frontier.score_bias = config.crawler.score_bias;
        Ok(frontier)
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Submits candidates to the frontier
    ///
    /// Each candidate is canonicalized, tested against the seen-set (marking
    /// it seen), then validated. Survivors are bulk-inserted with conflicts
    /// ignored, so submitting the same list twice has no further effect.
    /// Forum roots skip the seen-set but are still inserted only once; see
    /// [`Frontier::revive_root`] for the once-per-run revisit.
    ///
    /// # Returns
    ///
    /// The number of new frontier rows
    pub async fn add_urls(&self, candidates: Vec<FrontierEntry>) -> Result<usize> {
        let mut accepted = Vec::with_capacity(candidates.len());

        for mut entry in candidates {
            let url = match canonicalize(&entry.url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Dropping candidate: {}", e);
                    continue;
                }
            };
            entry.url = url.to_string();

            let always_visit = self.validator.is_always_visit(&url);
            if self.seen.test_and_add(&entry.url) && !always_visit {
                continue;
            }

            if !self.validator.validate_url(&url).await {
                continue;
            }

            entry.score = self.scorer.score(&entry.url);
            accepted.push(entry);
        }

        let mut added = 0;
        for chunk in accepted.chunks(self.insert_chunk.max(1)) {
            added += self.storage.insert_frontier(chunk)?;
        }

        Ok(added)
    }

    /// Makes a forum root live again, visited before or not
    ///
    /// Called once per run while seeding. Returns false, leaving the
    /// frontier untouched, for anything that is not a valid forum root.
    pub async fn revive_root(&self, url: &str) -> Result<bool> {
        let url = match canonicalize(url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Dropping root: {}", e);
                return Ok(false);
            }
        };

        if !self.validator.is_always_visit(&url) || !self.validator.validate_url(&url).await {
            return Ok(false);
        }

        let mut entry = FrontierEntry::new(url.as_str(), "", "");
        entry.score = self.scorer.score(&entry.url);
        self.seen.insert(&entry.url);
        self.storage.revive_frontier(&entry)?;
        Ok(true)
    }

    /// Submits discovered links, optionally with their ancestor directories
    ///
    /// Links failing validation are dropped before expansion. Forum links are
    /// never expanded.
    pub async fn add_and_expand(&self, links: &[Link], source_hash: &str, expand: bool) -> Result<usize> {
        let mut candidates = Vec::new();

        for link in links {
            let url = match canonicalize(&link.url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Dropping link: {}", e);
                    continue;
                }
            };

            if !self.validator.validate_url(&url).await {
                continue;
            }

            if expand && !self.validator.is_forum(&url) {
                for expanded in expand_url(&url) {
                    candidates.push(FrontierEntry::new(expanded.as_str(), &link.title, source_hash));
                }
            } else {
                candidates.push(FrontierEntry::new(url.as_str(), &link.title, source_hash));
            }
        }

        self.add_urls(candidates).await
    }

    /// Draws a random batch of live entries
    ///
    /// Returns [`CrawlError::NoMoreWork`] when nothing is live; callers
    /// should back off and retry.
    pub fn get_batch(&self, limit: usize) -> Result<Vec<FrontierEntry>> {
        let batch = self.storage.sample_frontier(limit, self.score_bias)?;
        if batch.is_empty() {
            return Err(CrawlError::NoMoreWork);
        }
        Ok(batch)
    }

    /// Marks an entry visited or discarded
    pub fn complete(&self, url: &str) -> Result<()> {
        self.storage.mark_removed(url)?;
        Ok(())
    }

    pub fn is_live(&self, url: &str) -> Result<bool> {
        Ok(self.storage.is_live(url)?)
    }

    /// Records a transient failure; returns true if the entry was retired
    pub fn record_failure(&self, url: &str, error: &str, max_attempts: u32) -> Result<bool> {
        Ok(self.storage.record_failure(url, error, max_attempts)?)
    }
}
