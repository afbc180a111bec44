use serde::Deserialize;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    pub blob: BlobConfig,
    #[serde(default)]
    pub forum: Option<ForumConfig>,
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Known-good starting URLs
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Regex patterns; a URL matching any of them is never crawled
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// Hosts the crawler is allowed to visit
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostEntry>,

    /// Score rules used to bias frontier sampling
    #[serde(default, rename = "score")]
    pub scores: Vec<ScoreEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers (0 picks a value from the core count)
    #[serde(default)]
    pub workers: usize,

    /// Frontier entries handed to a worker per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Hard ceiling on bytes read from a single response body
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Sleep between frontier polls when it has no live entries
    #[serde(rename = "empty-backoff-secs", default = "default_empty_backoff")]
    pub empty_backoff_secs: u64,

    /// Transient failures tolerated before a frontier entry is retired
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Rows written per bulk insert transaction
    #[serde(rename = "insert-chunk", default = "default_insert_chunk")]
    pub insert_chunk: usize,

    #[serde(rename = "stats-interval-secs", default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// How strongly scores skew the random frontier sample
    #[serde(rename = "score-bias", default = "default_score_bias")]
    pub score_bias: i64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Seen-set sizing
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_filter_capacity")]
    pub capacity: usize,

    #[serde(rename = "false-positive-rate", default = "default_false_positive_rate")]
    pub false_positive_rate: f64,
}

/// Where PDF bytes are uploaded
#[derive(Debug, Clone, Deserialize)]
pub struct BlobConfig {
    pub kind: BlobKind,

    /// Target directory for the local store
    #[serde(default)]
    pub directory: Option<String>,

    /// Base URL objects are PUT under for the http store
    #[serde(rename = "upload-url", default)]
    pub upload_url: Option<String>,

    /// Base URL recorded on documents; defaults to the upload location
    #[serde(rename = "public-base-url", default)]
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobKind {
    Local,
    Http,
}

/// Authenticated forum service reached through a virtual scheme
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    #[serde(default = "default_forum_scheme")]
    pub scheme: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable holding the session token
    #[serde(rename = "token-env", default)]
    pub token_env: Option<String>,
}

/// Web-archive seeding
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub prefixes: Vec<String>,

    /// Captures requested per CDX page
    #[serde(rename = "page-size", default = "default_archive_page_size")]
    pub page_size: usize,

    /// Timeout for one CDX page, separate from the fetch timeout
    #[serde(rename = "timeout-secs", default = "default_archive_timeout")]
    pub timeout_secs: u64,
}

/// An allowed host, optionally restricted to matching URLs
#[derive(Debug, Clone, Deserialize)]
pub struct HostEntry {
    pub name: String,

    /// When non-empty, a URL on this host must match one of these patterns
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Agent name used to pick the robots.txt group for this host
    #[serde(rename = "robots-agent", default)]
    pub robots_agent: Option<String>,
}

/// A scoring rule: every matching pattern adds `weight`
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEntry {
    pub weight: i64,
    pub patterns: Vec<String>,
}

impl Config {
    /// The virtual scheme used for forum URLs
    pub fn forum_scheme(&self) -> &str {
        self.forum
            .as_ref()
            .map(|f| f.scheme.as_str())
            .unwrap_or(DEFAULT_FORUM_SCHEME)
    }
}

impl CrawlerConfig {
    /// Resolves `workers = 0` to four workers per core, never fewer than eight
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            (num_cpus::get() * 4).max(8)
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            batch_size: default_batch_size(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            empty_backoff_secs: default_empty_backoff(),
            max_attempts: default_max_attempts(),
            insert_chunk: default_insert_chunk(),
            stats_interval_secs: default_stats_interval(),
            score_bias: default_score_bias(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            capacity: default_filter_capacity(),
            false_positive_rate: default_false_positive_rate(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_archive_endpoint(),
            prefixes: Vec::new(),
            page_size: default_archive_page_size(),
            timeout_secs: default_archive_timeout(),
        }
    }
}

pub const DEFAULT_FORUM_SCHEME: &str = "piazza";

fn default_batch_size() -> usize {
    50
}

fn default_max_body_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_empty_backoff() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_insert_chunk() -> usize {
    1000
}

fn default_stats_interval() -> u64 {
    10
}

fn default_score_bias() -> i64 {
    100
}

fn default_filter_capacity() -> usize {
    10_000_000
}

fn default_false_positive_rate() -> f64 {
    0.00001
}

fn default_forum_scheme() -> String {
    DEFAULT_FORUM_SCHEME.to_string()
}

fn default_archive_endpoint() -> String {
    "https://web.archive.org/cdx/search/cdx".to_string()
}

fn default_archive_page_size() -> usize {
    5000
}

fn default_archive_timeout() -> u64 {
    120
}
