//! Storage module for persisting job state
//!
//! This module is the job registry: it owns the SQLite database holding job
//! records, the discovered-link set, and the broken-link report, including:
//! - Schema management
//! - Job lifecycle (status, progress) persistence
//! - Chunk-safe bulk insertion of discovered links
//! - Paginated queries by check state

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStore;
pub use traits::{JobStore, StorageError, StorageResult};

use crate::config::JobSettings;
use crate::job::JobStatus;
use crate::LinkProbeError;

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_store(path: &Path) -> Result<SqliteStore, LinkProbeError> {
    SqliteStore::new(path)
}

/// A job row in the database
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub url: String,
    pub status: JobStatus,
    pub settings: JobSettings,
    pub progress_current: u64,
    pub progress_total: u64,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

/// A discovered link awaiting or past its liveness check
#[derive(Debug, Clone)]
pub struct DiscoveredLinkRecord {
    pub id: i64,
    pub job_id: i64,
    pub url: String,
    pub source_url: String,
    pub depth: u32,
    pub is_internal: bool,
    pub link_text: Option<String>,
    pub check_state: LinkCheckState,
    pub http_status: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub checked_at: Option<String>,
    pub is_working: Option<bool>,
    pub error_message: Option<String>,
}

/// Input shape for bulk discovered-link insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscoveredLink {
    pub url: String,
    pub source_url: String,
    pub depth: u32,
    pub is_internal: bool,
    pub link_text: Option<String>,
}

/// Check-result fields written onto a discovered link exactly once
#[derive(Debug, Clone)]
pub struct CheckUpdate {
    pub is_working: bool,
    pub http_status: Option<u16>,
    pub response_time_ms: u64,
    pub checked_at: String,
    pub error_message: Option<String>,
}

/// A broken-link report row
///
/// Keyed by (job_id, url, source_url): the same broken URL referenced from
/// several pages yields one row per referencing page.
#[derive(Debug, Clone)]
pub struct BrokenLinkRecord {
    pub id: i64,
    pub job_id: i64,
    pub url: String,
    pub source_url: String,
    pub status_code: Option<u16>,
    pub error_type: String,
    pub link_text: Option<String>,
    pub created_at: String,
}

/// Input shape for broken-link insertion
#[derive(Debug, Clone)]
pub struct NewBrokenLink {
    pub url: String,
    pub source_url: String,
    pub status_code: Option<u16>,
    pub error_type: String,
    pub link_text: Option<String>,
}

/// Result-report views over a job's rows
///
/// Closed set: each variant has exactly one query strategy in the store, so
/// adding a view means adding a variant and its query, not a string branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsView {
    /// Every discovered link, checked or not
    All,

    /// Links that checked out working
    Working,

    /// The broken-link report rows
    Broken,

    /// Distinct pages links were found on
    Pages,
}

/// One page of a results view
#[derive(Debug)]
pub enum ResultsPage {
    Links(Vec<DiscoveredLinkRecord>),
    Broken(Vec<BrokenLinkRecord>),
    Pages(Vec<String>),
}

/// Check state of a discovered link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkCheckState {
    Pending,
    Checked,
}

impl LinkCheckState {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Checked => "checked",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "checked" => Some(Self::Checked),
            _ => None,
        }
    }
}
