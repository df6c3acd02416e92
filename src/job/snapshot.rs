//! Point-in-time job status snapshots
//!
//! A snapshot is assembled from persisted rows only, so it can be produced
//! by any process that can open the registry, not just the one running the
//! job.

use crate::job::progress::percentage;
use crate::job::JobStatus;
use crate::storage::{JobRecord, JobStore};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Progress counters for the current phase
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub current: u64,
    pub total: u64,
    pub percentage: u32,

    /// Linear extrapolation from elapsed time; absent until the job has
    /// processed at least one unit and while nothing remains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds_remaining: Option<u64>,
}

/// Aggregate counts across the job's persisted rows
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub total_links_discovered: u64,
    pub broken_links_found: u64,
}

/// Everything a status query reports about one job
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: i64,
    pub url: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub stats: JobStats,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Builds a status snapshot for a job from the registry
pub fn poll_status<S: JobStore>(store: &S, job_id: i64) -> Result<JobSnapshot> {
    let job = store.get_job(job_id)?;
    let total_links_discovered = store.count_links(job_id)?;
    let broken_links_found = store.count_broken_links(job_id)?;

    let estimated_seconds_remaining = if job.status == JobStatus::Running {
        estimate_remaining(&job)
    } else {
        None
    };

    Ok(JobSnapshot {
        job_id: job.id,
        url: job.url,
        status: job.status,
        progress: JobProgress {
            current: job.progress_current,
            total: job.progress_total,
            percentage: percentage(job.progress_current, job.progress_total),
            estimated_seconds_remaining,
        },
        stats: JobStats {
            total_links_discovered,
            broken_links_found,
        },
        error_message: job.error_message,
    })
}

/// Extrapolates remaining seconds from the job's elapsed wall time
fn estimate_remaining(job: &JobRecord) -> Option<u64> {
    if job.progress_current == 0 || job.progress_total <= job.progress_current {
        return None;
    }

    let started = DateTime::parse_from_rfc3339(&job.created_at).ok()?;
    let elapsed_secs = Utc::now()
        .signed_duration_since(started)
        .num_seconds()
        .max(1) as f64;

    let remaining = job.progress_total - job.progress_current;
    let rate = job.progress_current as f64 / elapsed_secs;
    Some((remaining as f64 / rate).ceil() as u64)
}
