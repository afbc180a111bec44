//! Worker pool driving the crawl
//!
//! This module handles:
//! - Building every crawl component from configuration
//! - Restoring and flushing both seen-sets
//! - Seeding from configuration and the web archive
//! - The per-worker fetch, process, persist loop
//! - Periodic stats reporting and shutdown on Ctrl-C

use crate::archive::ArchiveClient;
use crate::config::Config;
use crate::crawler::content::ContentProcessor;
use crate::crawler::fetcher::{build_http_client, user_agent_string, Fetcher};
use crate::frontier::{Frontier, SeenFilter};
use crate::robots::HostPolicyCache;
use crate::storage::{open_storage, Document, FrontierEntry, Link, Storage};
use crate::url::{canonicalize, Validator};
use crate::{blob, forum, CrawlError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const URL_FILTER: &str = "urls";
const HASH_FILTER: &str = "hashes";

/// What a worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerPhase {
    Idle = 0,
    Fetching = 1,
    Processing = 2,
    Persisting = 3,
}

impl WorkerPhase {
    const ALL: [WorkerPhase; 4] = [
        WorkerPhase::Idle,
        WorkerPhase::Fetching,
        WorkerPhase::Processing,
        WorkerPhase::Persisting,
    ];

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerPhase::Fetching,
            2 => WorkerPhase::Processing,
            3 => WorkerPhase::Persisting,
            _ => WorkerPhase::Idle,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::Fetching => "fetching",
            WorkerPhase::Processing => "processing",
            WorkerPhase::Persisting => "persisting",
        }
    }
}

/// Result of handling one frontier entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A document was saved; `links_added` new frontier rows came from it
    Stored { status: u16, links_added: usize },
    /// The content was already stored under another URL
    Duplicate,
    /// The fetch failed; `retired` is set once the attempt budget is spent
    Failed { retired: bool },
    /// The entry no longer validates, or another worker got to it first
    Skipped,
}

#[derive(Debug, Default)]
struct CrawlStats {
    fetched: AtomicU64,
    stored: AtomicU64,
    duplicates: AtomicU64,
    failures: AtomicU64,
    links_added: AtomicU64,
}

/// Owns every shared crawl component and runs the worker pool
pub struct Crawler {
    config: Config,
    storage: Arc<dyn Storage>,
    frontier: Arc<Frontier>,
    url_seen: Arc<SeenFilter>,
    hash_seen: Arc<SeenFilter>,
    fetcher: Fetcher,
    processor: ContentProcessor,
    archive: ArchiveClient,
    phases: Vec<AtomicU8>,
    stats: CrawlStats,
}

impl Crawler {
    /// Builds the crawler and all of its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Validated crawler configuration
    /// * `storage` - The opened durable store
    pub fn from_config(config: Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;

        let overrides: HashMap<String, String> = config
            .hosts
            .iter()
            .filter_map(|h| {
                h.robots_agent
                    .as_ref()
                    .map(|agent| (h.name.to_lowercase(), agent.clone()))
            })
            .collect();
        let policies = Arc::new(HostPolicyCache::new(
            client.clone(),
            &config.user_agent.crawler_name,
            overrides,
        ));
        let validator = Arc::new(Validator::from_config(&config, policies)?);

        let url_seen = Arc::new(SeenFilter::new(
            URL_FILTER,
            config.filter.capacity,
            config.filter.false_positive_rate,
        )?);
        let hash_seen = Arc::new(SeenFilter::new(
            HASH_FILTER,
            config.filter.capacity,
            config.filter.false_positive_rate,
        )?);

        let frontier = Arc::new(Frontier::from_config(
            &config,
            Arc::clone(&storage),
            Arc::clone(&url_seen),
            validator,
        )?);

        let forum = forum::from_config(config.forum.as_ref(), client.clone())?;
        let blobs = blob::from_config(&config.blob, client.clone())?;

        let fetcher = Fetcher::new(
            client.clone(),
            forum,
            config.forum_scheme(),
            config.crawler.max_body_bytes,
        );
        let processor = ContentProcessor::new(blobs, config.forum_scheme());
        let archive = ArchiveClient::new(client, &config.archive);

        let phases = (0..config.crawler.effective_workers())
            .map(|_| AtomicU8::new(WorkerPhase::Idle as u8))
            .collect();

        tracing::debug!("User agent: {}", user_agent_string(&config.user_agent));

        Ok(Self {
            config,
            storage,
            frontier,
            url_seen,
            hash_seen,
            fetcher,
            processor,
            archive,
            phases,
            stats: CrawlStats::default(),
        })
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn worker_count(&self) -> usize {
        self.phases.len()
    }

    /// Rebuilds both seen-sets before any crawling starts
    ///
    /// Saved snapshots are restored first, then the frontier and document
    /// tables are scanned. A failure here must stop the process.
    pub fn restore_seen(&self) -> Result<()> {
        for filter in [&self.url_seen, &self.hash_seen] {
            if filter.load(self.storage.as_ref())? {
                tracing::info!("Restored {} filter from snapshot", filter.name());
            }
        }

        let urls = self.url_seen.populate_from_frontier(self.storage.as_ref())?;
        let hashes = self.hash_seen.populate_from_documents(self.storage.as_ref())?;
        tracing::info!("Seen-sets loaded: {} URLs, {} document hashes", urls, hashes);

        Ok(())
    }

    /// Writes both seen-sets to the store
    pub fn flush_seen(&self) -> Result<()> {
        for filter in [&self.url_seen, &self.hash_seen] {
            filter.flush(self.storage.as_ref())?;
        }
        tracing::info!("Flushed seen-sets");
        Ok(())
    }

    /// Submits the configured seed URLs with ancestor expansion
    ///
    /// Forum roots among the seeds are made live again even if an earlier
    /// run visited them. This is the only place that happens, so a root
    /// is fetched at most once per run.
    pub async fn seed(&self) -> Result<usize> {
        let mut added = 0;
        let mut links = Vec::new();

        for url in &self.config.seeds {
            if self.frontier.revive_root(url).await? {
                added += 1;
            } else {
                links.push(Link {
                    title: String::new(),
                    url: url.clone(),
                });
            }
        }

        added += self.frontier.add_and_expand(&links, "", true).await?;
        tracing::info!(
            "Seeded {} URLs from {} configured seeds",
            added,
            self.config.seeds.len()
        );
        Ok(added)
    }

    /// Queues archived URLs under every configured prefix
    pub async fn seed_archive(&self) -> usize {
        let prefixes = &self.config.archive.prefixes;
        if prefixes.is_empty() {
            return 0;
        }

        let added = self.archive.seed(&self.frontier, prefixes).await;
        tracing::info!("Archive seeding added {} URLs", added);
        added
    }

    fn set_phase(&self, worker: usize, phase: WorkerPhase) {
        if let Some(slot) = self.phases.get(worker) {
            slot.store(phase as u8, Ordering::Relaxed);
        }
    }

    /// Counts workers per phase
    pub fn phase_counts(&self) -> [(WorkerPhase, usize); 4] {
        let mut counts = WorkerPhase::ALL.map(|p| (p, 0));
        for slot in &self.phases {
            let phase = WorkerPhase::from_u8(slot.load(Ordering::Relaxed));
            counts[phase as usize].1 += 1;
        }
        counts
    }

    /// Fetches, processes, and persists one frontier entry
    ///
    /// The entry is removed once its document is saved, when it no longer
    /// validates, or when its content is a known duplicate. A fetch failure
    /// counts against the entry's attempt budget. A processing or storage
    /// error is returned and leaves the entry live for a later batch.
    pub async fn process_entry(&self, worker: usize, entry: &FrontierEntry) -> Result<Outcome> {
        let url = match canonicalize(&entry.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Discarding unparseable entry {}: {}", entry.url, e);
                self.frontier.complete(&entry.url)?;
                return Ok(Outcome::Skipped);
            }
        };

        if !self.frontier.validator().validate_url(&url).await {
            tracing::debug!("Discarding {}: no longer valid", entry.url);
            self.frontier.complete(&entry.url)?;
            return Ok(Outcome::Skipped);
        }

        // Batches are random samples, so two workers can draw the same entry.
        if !self.frontier.is_live(&entry.url)? {
            return Ok(Outcome::Skipped);
        }

        self.set_phase(worker, WorkerPhase::Fetching);
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", entry.url, e);
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                let retired = self.frontier.record_failure(
                    &entry.url,
                    &e.to_string(),
                    self.config.crawler.max_attempts,
                )?;
                if retired {
                    tracing::info!("Retired {} after repeated failures", entry.url);
                }
                return Ok(Outcome::Failed { retired });
            }
        };
        self.stats.fetched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("GET {} {}", body.status, entry.url);

        let always_visit = self.frontier.validator().is_always_visit(&url);
        if self.hash_seen.test_and_add(&body.hash)
            && !always_visit
            && self.storage.has_document(&body.hash)?
        {
            tracing::debug!("Duplicate content {} at {}", body.hash, entry.url);
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            self.frontier.complete(&entry.url)?;
            return Ok(Outcome::Duplicate);
        }

        self.set_phase(worker, WorkerPhase::Processing);
        let processed = self.processor.process(&body).await?;

        self.set_phase(worker, WorkerPhase::Persisting);
        let document = Document {
            hash: body.hash.clone(),
            source_url: entry.url.clone(),
            fetched_at: Utc::now().to_rfc3339(),
            status_code: body.status,
            content_type: body.content_type.clone(),
            storage_url: processed.storage_url,
            title: processed.title,
            url_title: entry.title.clone(),
            text: processed.text,
            links: processed.links,
            metadata: processed.metadata,
            referer_hash: entry.source_hash.clone(),
        };

        if self.storage.save_document(&document)? {
            self.stats.stored.fetch_add(1, Ordering::Relaxed);
        }
        self.frontier.complete(&entry.url)?;

        let mut links_added = 0;
        if body.status == 200 && !document.links.is_empty() {
            links_added = self
                .frontier
                .add_and_expand(&document.links, &document.hash, true)
                .await?;
            self.stats
                .links_added
                .fetch_add(links_added as u64, Ordering::Relaxed);
        }

        Ok(Outcome::Stored {
            status: body.status,
            links_added,
        })
    }

    async fn worker_loop(self: Arc<Self>, worker: usize, mut shutdown: watch::Receiver<bool>) {
        let backoff = Duration::from_secs(self.config.crawler.empty_backoff_secs);
        tracing::debug!("Worker {} started", worker);

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.set_phase(worker, WorkerPhase::Idle);

            let batch = match self.frontier.get_batch(self.config.crawler.batch_size) {
                Ok(batch) => batch,
                Err(e) => {
                    if !matches!(e, CrawlError::NoMoreWork) {
                        tracing::warn!("Worker {} could not draw a batch: {}", worker, e);
                    }
                    if wait_or_shutdown(backoff, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            for entry in &batch {
                if *shutdown.borrow() {
                    break;
                }
                if let Err(e) = self.process_entry(worker, entry).await {
                    tracing::warn!("Failed to process {}: {}", entry.url, e);
                }
                self.set_phase(worker, WorkerPhase::Idle);
            }
        }

        self.set_phase(worker, WorkerPhase::Idle);
        tracing::debug!("Worker {} stopped", worker);
    }

    fn log_stats(&self) {
        let live = self.storage.live_count().unwrap_or(0);
        let known = self.storage.frontier_count().unwrap_or(0);
        let documents = self.storage.document_count().unwrap_or(0);
        let phases = self
            .phase_counts()
            .iter()
            .map(|(phase, n)| format!("{}={}", phase.name(), n))
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(
            "Frontier: {} live / {} seen, {} documents | fetched {} stored {} duplicate {} failed {} | {}",
            live,
            known,
            documents,
            self.stats.fetched.load(Ordering::Relaxed),
            self.stats.stored.load(Ordering::Relaxed),
            self.stats.duplicates.load(Ordering::Relaxed),
            self.stats.failures.load(Ordering::Relaxed),
            phases
        );
    }

    /// Runs the worker pool until `shutdown` flips to true
    ///
    /// Archive seeding and the stats monitor run beside the workers and are
    /// aborted when the workers exit. Both seen-sets are flushed on the way out.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!("Starting {} workers", self.worker_count());

        let seeder = {
            let crawler = Arc::clone(&self);
            tokio::spawn(async move {
                crawler.seed_archive().await;
            })
        };

        let monitor = {
            let crawler = Arc::clone(&self);
            let interval = Duration::from_secs(self.config.crawler.stats_interval_secs.max(1));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    crawler.log_stats();
                }
            })
        };

        let workers: Vec<_> = (0..self.worker_count())
            .map(|worker| tokio::spawn(Arc::clone(&self).worker_loop(worker, shutdown.clone())))
            .collect();

        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        seeder.abort();
        monitor.abort();

        self.log_stats();
        self.flush_seen()
    }
}

/// Sleeps for `delay`; returns true if shutdown was requested meanwhile
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => {
            if changed.is_err() {
                return true;
            }
            let stop = *shutdown.borrow();
            stop
        }
    }
}

/// Runs a complete crawl until interrupted
///
/// Startup is all-or-nothing: the store must open and both seen-sets must
/// load before any worker starts. The first Ctrl-C lets workers finish the
/// entry in hand; a second one exits immediately.
pub async fn run_crawl(config: Config) -> Result<()> {
    let storage: Arc<dyn Storage> =
        Arc::new(open_storage(Path::new(&config.storage.database_path))?);

    let crawler = Arc::new(Crawler::from_config(config, storage)?);
    crawler.restore_seen()?;
    crawler.seed().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, finishing in-flight work (press again to force quit)");
                let _ = shutdown_tx.send(true);

                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Force quit requested");
                    std::process::exit(1);
                }
            }
            Err(e) => {
                tracing::error!("Unable to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    crawler.run(shutdown_rx).await
}
