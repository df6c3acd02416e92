//! Chunk scheduler — drives a job through its phases in bounded batches
//!
//! Both phases persist progress between batches, so a crash or external
//! timeout mid-job leaves resumable state: re-running the job picks up from
//! the recorded counters instead of restarting. Cancellation is cooperative
//! and observed at batch boundaries only; an in-flight batch always
//! completes.

use crate::config::{Config, DiscoveryConfig};
use crate::crawler::{build_http_client, check_batch, run_discovery, CheckTarget, CheckerError};
use crate::job::progress::{percentage, ProgressTracker};
use crate::job::{JobStatus, PreAnalyzedUrl, StartRequest, StartResponse, STOPPED_MESSAGE};
use crate::storage::{
    CheckUpdate, JobRecord, JobStore, LinkCheckState, NewBrokenLink, NewDiscoveredLink,
};
use crate::url::{is_internal, normalize_url};
use crate::{LinkProbeError, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Scheduler knobs resolved from the loaded configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Links checked per batch
    pub chunk_size: usize,

    /// Delay between batches, throttling the target site and the registry
    pub batch_delay_ms: u64,

    pub discovery: DiscoveryConfig,
}

impl RunnerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.checker.chunk_size,
            batch_delay_ms: config.checker.batch_delay_ms,
            discovery: config.discovery.clone(),
        }
    }
}

/// Drives jobs through discovery and checking phases
///
/// The store is the only shared mutable resource; each job owns distinct
/// rows, so multiple runners over the same store can execute different jobs
/// concurrently.
pub struct JobRunner<S: JobStore> {
    store: Arc<Mutex<S>>,
    config: RunnerConfig,
}

impl<S: JobStore> JobRunner<S> {
    pub fn new(store: Arc<Mutex<S>>, config: RunnerConfig) -> Self {
        Self { store, config }
    }

    /// Creates a job from a start request
    ///
    /// Smart starts (pre-analyzed URLs supplied) load the discovered-link set
    /// directly and move straight to `ready_for_checking`; traditional starts
    /// stay `pending` until discovery runs.
    pub fn start_job(&self, request: StartRequest) -> Result<StartResponse> {
        if matches!(&request.pre_analyzed_urls, Some(urls) if urls.is_empty()) {
            return Err(CheckerError::EmptyBatch.into());
        }

        let mut store = self.store.lock().unwrap();
        let job_id = store.create_job(&request.url, &request.settings)?;

        let (status, urls_to_check) = match request.pre_analyzed_urls {
            Some(urls) => {
                let links = pre_analyzed_to_links(&request.url, &urls);
                let inserted = store.add_discovered_links(job_id, &links)?;
                store.update_job_status(job_id, JobStatus::ReadyForChecking, None)?;
                store.update_job_progress(job_id, 0, inserted as u64)?;
                (JobStatus::ReadyForChecking, inserted as u64)
            }
            None => (JobStatus::Pending, 0),
        };

        tracing::info!(
            "Created job {} for {} ({:?}, {} pre-analyzed URLs)",
            job_id,
            request.url,
            status,
            urls_to_check
        );

        Ok(StartResponse {
            job_id,
            status,
            urls_to_check,
        })
    }

    /// Requests a stop: a forced transition to `failed` with a sentinel
    /// message, observed by the running scheduler at its next batch boundary
    pub fn stop_job(&self, job_id: i64) -> Result<()> {
        self.store
            .lock()
            .unwrap()
            .update_job_status(job_id, JobStatus::Failed, Some(STOPPED_MESSAGE))?;
        tracing::info!("Job {}: stop requested", job_id);
        Ok(())
    }

    /// Runs a job to a terminal state
    ///
    /// Any fatal error marks the job `failed` with the error message before
    /// propagating; previously persisted rows remain queryable.
    pub async fn run(&self, job_id: i64) -> Result<()> {
        match self.execute(job_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Job {}: fatal error: {}", job_id, message);
                if let Err(update_err) = self.store.lock().unwrap().update_job_status(
                    job_id,
                    JobStatus::Failed,
                    Some(&message),
                ) {
                    tracing::error!(
                        "Job {}: could not record failure: {}",
                        job_id,
                        update_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, job_id: i64) -> Result<()> {
        let job = self.store.lock().unwrap().get_job(job_id)?;

        match job.status {
            JobStatus::Pending => {
                self.discovery_phase(&job).await?;
                self.checking_phase(job_id).await
            }
            // Running means a previous invocation died mid-phase; resume
            // checking from recorded state (checked rows stay checked)
            JobStatus::ReadyForChecking | JobStatus::Running => {
                self.checking_phase(job_id).await
            }
            status => Err(LinkProbeError::JobNotReady {
                id: job_id,
                status,
                expected: JobStatus::ReadyForChecking,
            }),
        }
    }

    /// Traditional-start discovery phase
    async fn discovery_phase(&self, job: &JobRecord) -> Result<()> {
        let job_id = job.id;
        self.store
            .lock()
            .unwrap()
            .update_job_status(job_id, JobStatus::Running, None)?;

        let client = build_http_client(job.settings.timeout_ms)?;
        run_discovery(
            &client,
            &self.store,
            job_id,
            &job.url,
            &job.settings,
            &self.config.discovery,
        )
        .await?;

        // A stop may have landed while discovery ran
        let mut store = self.store.lock().unwrap();
        if store.get_job(job_id)?.status.is_terminal() {
            tracing::info!("Job {}: stopped during discovery", job_id);
            return Ok(());
        }

        let total = store.count_links(job_id)?;
        store.update_job_status(job_id, JobStatus::ReadyForChecking, None)?;
        store.update_job_progress(job_id, 0, total)?;
        Ok(())
    }

    /// Checking phase: pending links are processed in bounded chunks
    async fn checking_phase(&self, job_id: i64) -> Result<()> {
        let (settings, total, mut current) = {
            let mut store = self.store.lock().unwrap();
            let job = store.get_job(job_id)?;
            if job.status.is_terminal() {
                tracing::info!("Job {}: already terminal, nothing to check", job_id);
                return Ok(());
            }

            // Already running when resuming after a crash
            if job.status != JobStatus::Running {
                store.update_job_status(job_id, JobStatus::Running, None)?;
            }

            let total = store.count_links(job_id)?;
            // Resume support: previously checked links stay checked
            let checked = store.count_links_by_state(job_id, LinkCheckState::Checked)?;
            store.update_job_progress(job_id, checked, total)?;
            (job.settings, total, checked)
        };

        let client = build_http_client(settings.timeout_ms)?;
        let tracker = ProgressTracker::start();

        // Head-of-queue rows that a failed batch left pending are skipped on
        // subsequent reads; their count still feeds the progress counters
        let mut skip_offset = 0usize;

        loop {
            // Batch boundary: observe external cancellation cooperatively
            let status = self.store.lock().unwrap().get_job(job_id)?.status;
            if status.is_terminal() {
                tracing::info!(
                    "Job {}: stop observed at batch boundary, {} of {} processed",
                    job_id,
                    current,
                    total
                );
                return Ok(());
            }

            let page = self.store.lock().unwrap().links_page(
                job_id,
                LinkCheckState::Pending,
                self.config.chunk_size,
                skip_offset,
            )?;

            if page.is_empty() {
                break;
            }

            let batch_len = page.len() as u64;
            match self.process_batch(&client, job_id, &settings, &page).await {
                Ok(()) => {}
                Err(e) => {
                    // One bad batch never aborts the job; its rows stay
                    // pending and are skipped from now on
                    tracing::error!("Job {}: batch failed, continuing: {}", job_id, e);
                    skip_offset += page.len();
                }
            }

            current += batch_len;
            self.store
                .lock()
                .unwrap()
                .update_job_progress(job_id, current, total)?;

            tracing::info!(
                "Job {}: checked {}/{} links ({}%), eta {:?}",
                job_id,
                current,
                total,
                percentage(current, total),
                tracker.estimate_remaining(current, total)
            );

            if current < total {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        self.store
            .lock()
            .unwrap()
            .update_job_status(job_id, JobStatus::Completed, None)?;
        tracing::info!("Job {}: completed, {} links checked", job_id, current);
        Ok(())
    }

    /// Checks one chunk of links and persists every outcome
    async fn process_batch(
        &self,
        client: &reqwest::Client,
        job_id: i64,
        settings: &crate::config::JobSettings,
        page: &[crate::storage::DiscoveredLinkRecord],
    ) -> Result<()> {
        let targets: Vec<CheckTarget> = page
            .iter()
            .map(|link| CheckTarget {
                url: link.url.clone(),
                source_url: link.source_url.clone(),
                link_text: link.link_text.clone(),
            })
            .collect();

        let outcomes = check_batch(
            client,
            &targets,
            settings.max_concurrent,
            settings.retry_attempts,
        )
        .await?;

        let mut store = self.store.lock().unwrap();
        // Results are index-aligned with targets, so source attribution
        // comes straight from the matching input row
        for (target, outcome) in targets.iter().zip(&outcomes) {
            let update = CheckUpdate {
                is_working: outcome.is_working,
                http_status: outcome.status_code,
                response_time_ms: outcome.response_time_ms,
                checked_at: outcome.checked_at.clone(),
                error_message: outcome.error_message.clone(),
            };
            store.mark_link_checked(job_id, &target.url, &update)?;

            if !outcome.is_working {
                let error_type = outcome
                    .error
                    .map(|kind| kind.as_db_string())
                    .unwrap_or_else(|| "other".to_string());
                store.add_broken_link(
                    job_id,
                    &NewBrokenLink {
                        url: target.url.clone(),
                        source_url: target.source_url.clone(),
                        status_code: outcome.status_code,
                        error_type,
                        link_text: target.link_text.clone(),
                    },
                )?;
            }
        }

        Ok(())
    }
}

/// Converts caller-supplied URLs into discovered-link rows
///
/// URLs are normalized where possible; unparseable entries are kept verbatim
/// so the checker can record an `invalid_url` verdict for them.
fn pre_analyzed_to_links(job_url: &str, urls: &[PreAnalyzedUrl]) -> Vec<NewDiscoveredLink> {
    let origin_host = Url::parse(job_url)
        .ok()
        .and_then(|u| crate::url::extract_host(&u));

    urls.iter()
        .map(|entry| {
            let (url, internal) = match normalize_url(&entry.url) {
                Ok(normalized) => {
                    let internal = origin_host
                        .as_deref()
                        .map(|host| is_internal(&normalized, host))
                        .unwrap_or(false);
                    (normalized.to_string(), internal)
                }
                Err(_) => (entry.url.clone(), false),
            };

            NewDiscoveredLink {
                url,
                source_url: entry
                    .source_url
                    .clone()
                    .unwrap_or_else(|| job_url.to_string()),
                depth: 0,
                is_internal: internal,
                link_text: entry.link_text.clone(),
            }
        })
        .collect()
}
