use serde::Deserialize;

/// Main configuration structure for linkprobe
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub checker: CheckerConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// HTTP checker behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of check requests in flight at once within a batch
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Retries per URL on transient failures (timeout, connect, DNS)
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Number of links checked per batch
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Delay between batches in milliseconds, to throttle the target site
    #[serde(rename = "batch-delay-ms", default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

/// Discovery traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Default maximum crawl depth from the start URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Whether external links are discovered (and checked) by default
    #[serde(rename = "include-external", default)]
    pub include_external: bool,

    /// Ceiling on links extracted from a single page
    #[serde(rename = "max-links-per-page", default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    /// Global safety cap on pages fetched during one discovery run
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Number of frontier entries fetched per batch
    #[serde(rename = "page-batch-size", default = "default_page_batch_size")]
    pub page_batch_size: usize,

    /// Discovered links are flushed to storage in chunks of this size
    #[serde(rename = "flush-chunk-size", default = "default_flush_chunk_size")]
    pub flush_chunk_size: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

/// Per-job settings, resolved from config defaults and CLI overrides
///
/// Stored on the job row so a resumed job keeps the settings it started with.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub max_depth: u32,
    pub include_external: bool,
    pub timeout_ms: u64,
    pub max_concurrent: usize,
    pub retry_attempts: u32,
}

impl Config {
    /// Resolves job settings from this configuration
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            max_depth: self.discovery.max_depth,
            include_external: self.discovery.include_external,
            timeout_ms: self.checker.timeout_ms,
            max_concurrent: self.checker.max_concurrent,
            retry_attempts: self.checker.retry_attempts,
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_concurrent: default_max_concurrent(),
            retry_attempts: default_retry_attempts(),
            chunk_size: default_chunk_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            include_external: false,
            max_links_per_page: default_max_links_per_page(),
            max_pages: default_max_pages(),
            page_batch_size: default_page_batch_size(),
            flush_chunk_size: default_flush_chunk_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrent() -> usize {
    10
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_chunk_size() -> usize {
    50
}

fn default_batch_delay_ms() -> u64 {
    250
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_links_per_page() -> usize {
    200
}

fn default_max_pages() -> usize {
    500
}

fn default_page_batch_size() -> usize {
    10
}

fn default_flush_chunk_size() -> usize {
    100
}

fn default_database_path() -> String {
    "linkprobe.db".to_string()
}
