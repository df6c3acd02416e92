//! Storage traits and error types
//!
//! Defines the job registry interface consumed by the discovery engine and
//! the chunk scheduler, plus associated error types.

use crate::config::JobSettings;
use crate::job::JobStatus;
use crate::storage::{
    BrokenLinkRecord, CheckUpdate, DiscoveredLinkRecord, LinkCheckState, NewBrokenLink,
    NewDiscoveredLink, ResultsPage, ResultsView,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Invalid job status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for job registry implementations
///
/// Job, discovered-link, and broken-link rows are mutated only through these
/// operations; each job owns distinct rows, so concurrent jobs need no
/// additional in-process locking.
pub trait JobStore {
    // ===== Job Lifecycle =====

    /// Creates a new job in the `pending` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created job
    fn create_job(&mut self, url: &str, settings: &JobSettings) -> StorageResult<i64>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<crate::storage::JobRecord>;

    /// Updates the status of a job
    ///
    /// Rejects transitions not allowed by the job state machine, so a stored
    /// status can never revert to an earlier state. Reaching a terminal
    /// status also stamps `completed_at`.
    fn update_job_status(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Updates the progress counters of a job
    fn update_job_progress(&mut self, job_id: i64, current: u64, total: u64) -> StorageResult<()>;

    // ===== Discovered Links =====

    /// Bulk-inserts discovered links, deduplicating on (job_id, url)
    ///
    /// The input is split into bounded chunks internally, so callers may pass
    /// arbitrarily large slices. Returns the number of rows actually
    /// inserted (duplicates are ignored).
    fn add_discovered_links(
        &mut self,
        job_id: i64,
        links: &[NewDiscoveredLink],
    ) -> StorageResult<usize>;

    /// Records a check result on a pending link, moving it to `checked`
    ///
    /// The update is guarded on the current state being `pending`, so a link
    /// can only ever be checked once per job. Returns false if the row was
    /// already checked (or does not exist).
    fn mark_link_checked(
        &mut self,
        job_id: i64,
        url: &str,
        update: &CheckUpdate,
    ) -> StorageResult<bool>;

    /// Paginated query of discovered links by check state
    fn links_page(
        &self,
        job_id: i64,
        state: LinkCheckState,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<DiscoveredLinkRecord>>;

    /// Counts all discovered links for a job
    fn count_links(&self, job_id: i64) -> StorageResult<u64>;

    /// Counts discovered links in a specific check state
    fn count_links_by_state(&self, job_id: i64, state: LinkCheckState) -> StorageResult<u64>;

    // ===== Broken Links =====

    /// Records a broken link for a job
    ///
    /// A duplicate (job_id, url, source_url) triple is ignored; distinct
    /// source pages for the same URL produce distinct rows.
    fn add_broken_link(&mut self, job_id: i64, link: &NewBrokenLink) -> StorageResult<()>;

    /// Paginated query of broken links for a job
    fn broken_links_page(
        &self,
        job_id: i64,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<BrokenLinkRecord>>;

    /// Counts broken links for a job
    fn count_broken_links(&self, job_id: i64) -> StorageResult<u64>;

    // ===== Result Views =====

    /// Paginated query for one result-report view
    fn results_page(
        &self,
        job_id: i64,
        view: ResultsView,
        limit: usize,
        offset: usize,
    ) -> StorageResult<ResultsPage>;
}
