//! Linkprobe: a broken-link auditor for websites
//!
//! This crate crawls a website breadth-first to discover its links, probes
//! each link's liveness over HTTP with bounded concurrency, and keeps a
//! durable, resumable job record in SQLite.

pub mod config;
pub mod crawler;
pub mod job;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for linkprobe operations
#[derive(Debug, Error)]
pub enum LinkProbeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Checker error: {0}")]
    Checker(#[from] crawler::CheckerError),

    #[error("Job {id} is in state {status:?}, expected {expected:?}")]
    JobNotReady {
        id: i64,
        status: job::JobStatus,
        expected: job::JobStatus,
    },

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for linkprobe operations
pub type Result<T> = std::result::Result<T, LinkProbeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use job::{JobRunner, JobStatus, StartRequest, StartResponse};
pub use storage::{JobStore, SqliteStore};
pub use url::{extract_host, is_internal, normalize_url};
