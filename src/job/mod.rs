//! Job state machine and scheduling
//!
//! A job moves through a fixed set of states:
//!
//! - traditional crawl: `pending -> running` (discovery) `->
//!   ready_for_checking -> running` (checking) `-> completed`
//! - smart crawl (pre-analyzed URLs): `pending -> ready_for_checking ->
//!   running -> completed`
//! - `failed` is reachable from any non-terminal state, including by a
//!   user-requested stop
//!
//! Transitions never revert to an earlier state; terminal states absorb.

mod progress;
mod runner;
mod snapshot;

pub use progress::ProgressTracker;
pub use runner::{JobRunner, RunnerConfig};
pub use snapshot::{poll_status, JobProgress, JobSnapshot, JobStats};

use serde::{Deserialize, Serialize};

/// Error message stored when a job is stopped by the user
pub const STOPPED_MESSAGE: &str = "stopped by user";

/// Status of a link check job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job created, no phase started yet
    Pending,

    /// A discovery or checking phase is executing
    Running,

    /// Discovery finished (or was skipped); links await checking
    ReadyForChecking,

    /// All discovered links were processed
    Completed,

    /// Fatal error or user stop; partial results remain queryable
    Failed,
}

impl JobStatus {
    /// Returns true if no further processing will happen for this job
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether a transition from this status to `to` is allowed
    ///
    /// This is the whole state machine; storage rejects anything else.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        match (self, to) {
            // Failure (fatal error or stop) from any non-terminal state
            (from, Failed) if !from.is_terminal() => true,
            (Pending, Running) => true,
            // Smart starts skip discovery entirely
            (Pending, ReadyForChecking) => true,
            (Running, ReadyForChecking) => true,
            (Running, Completed) => true,
            (ReadyForChecking, Running) => true,
            _ => false,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ReadyForChecking => "ready_for_checking",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "ready_for_checking" => Some(Self::ReadyForChecking),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A URL supplied directly by the caller, skipping discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreAnalyzedUrl {
    pub url: String,

    /// Page the URL was found on; defaults to the job's target URL
    #[serde(default)]
    pub source_url: Option<String>,

    #[serde(default)]
    pub link_text: Option<String>,
}

/// Request to start a new job
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// Target URL (crawl origin for traditional starts)
    pub url: String,

    pub settings: crate::config::JobSettings,

    /// When present, the job starts in smart mode and skips discovery
    pub pre_analyzed_urls: Option<Vec<PreAnalyzedUrl>>,
}

/// Response to a job start request
#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub job_id: i64,
    pub status: JobStatus,
    pub urls_to_check: u64,
}
