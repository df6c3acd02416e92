//! Integration tests for the job pipeline
//!
//! These tests use wiremock to create mock HTTP servers and drive full jobs
//! end-to-end: discovery, checking, and the persisted report.

use linkprobe::config::{DiscoveryConfig, JobSettings};
use linkprobe::crawler::{build_http_client, check_batch, CheckTarget};
use linkprobe::job::{
    poll_status, JobRunner, JobStatus, PreAnalyzedUrl, RunnerConfig, StartRequest, STOPPED_MESSAGE,
};
use linkprobe::storage::{JobStore, LinkCheckState, SqliteStore, StorageError};
use linkprobe::LinkProbeError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings() -> JobSettings {
    JobSettings {
        max_depth: 1,
        include_external: false,
        timeout_ms: 2_000,
        max_concurrent: 5,
        retry_attempts: 0,
    }
}

fn test_runner() -> (JobRunner<SqliteStore>, Arc<Mutex<SqliteStore>>) {
    let store = Arc::new(Mutex::new(
        SqliteStore::new_in_memory().expect("Failed to open in-memory DB"),
    ));
    let config = RunnerConfig {
        chunk_size: 10,
        batch_delay_ms: 0,
        discovery: DiscoveryConfig::default(),
    };
    (JobRunner::new(store.clone(), config), store)
}

async fn mount_html(server: &MockServer, page_path: &str, body: String) {
    // set_body_raw, not set_body_string: the latter pins text/plain and the
    // fetcher would skip the page as non-HTML
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_job_records_broken_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Index links to one working page and two broken ones
    mount_html(
        &mock_server,
        "/",
        format!(
            r#"<html><body>
            <a href="{0}/ok">OK</a>
            <a href="{0}/missing">Missing</a>
            <a href="{0}/gone">Gone</a>
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_html(&mock_server, "/ok", "<html><body>fine</body></html>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: None,
        })
        .expect("Failed to start job");
    assert_eq!(response.status, JobStatus::Pending);

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let job = store.get_job(response.job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Completed);

    // max_depth=1: the three links sit on the depth bound and are checked
    // but never crawled themselves
    let total = store.count_links(response.job_id).expect("count failed");
    assert_eq!(total, 3, "Expected exactly 3 discovered links");

    let checked = store
        .count_links_by_state(response.job_id, LinkCheckState::Checked)
        .expect("count failed");
    assert_eq!(checked, 3, "All links should be checked");
    assert_eq!(job.progress_current, job.progress_total);

    let broken = store
        .broken_links_page(response.job_id, 100, 0)
        .expect("query failed");
    assert_eq!(broken.len(), 2, "Expected 2 broken links");
    for link in &broken {
        // Every broken link names the page it was found on
        assert_eq!(link.source_url, format!("{}/", base_url));
        assert!(link.error_type.starts_with("http_"));
    }

    let status_codes: Vec<Option<u16>> = broken.iter().map(|l| l.status_code).collect();
    assert!(status_codes.contains(&Some(404)));
    assert!(status_codes.contains(&Some(500)));
}

#[tokio::test]
async fn test_smart_mode_skips_discovery() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Discovery would fetch the index; smart mode must not
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><a href=\"/never\">n</a></body></html>",
            "text/html",
        ))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/a", "<html><body>a</body></html>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: Some(vec![
                PreAnalyzedUrl {
                    url: format!("{}/a", base_url),
                    source_url: None,
                    link_text: None,
                },
                PreAnalyzedUrl {
                    url: format!("{}/b", base_url),
                    source_url: Some(format!("{}/listing", base_url)),
                    link_text: Some("b".to_string()),
                },
            ]),
        })
        .expect("Failed to start job");

    assert_eq!(response.status, JobStatus::ReadyForChecking);
    assert_eq!(response.urls_to_check, 2);

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let job = store.get_job(response.job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Completed);

    let broken = store
        .broken_links_page(response.job_id, 100, 0)
        .expect("query failed");
    assert_eq!(broken.len(), 1);
    // Caller-supplied source attribution survives into the report
    assert_eq!(broken[0].source_url, format!("{}/listing", base_url));
    assert_eq!(broken[0].status_code, Some(404));
    assert_eq!(broken[0].link_text.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_timeout_classified_as_timeout() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let mut settings = test_settings();
    settings.timeout_ms = 300;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings,
            pre_analyzed_urls: Some(vec![PreAnalyzedUrl {
                url: format!("{}/slow", base_url),
                source_url: None,
                link_text: None,
            }]),
        })
        .expect("Failed to start job");

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let broken = store
        .broken_links_page(response.job_id, 100, 0)
        .expect("query failed");
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].error_type, "timeout");
    assert_eq!(broken[0].status_code, None);
}

#[tokio::test]
async fn test_unreachable_host_recorded_not_fatal() {
    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: "http://example.com/".to_string(),
            settings: test_settings(),
            pre_analyzed_urls: Some(vec![PreAnalyzedUrl {
                // Reserved port on localhost, connection is refused
                url: "http://127.0.0.1:1/".to_string(),
                source_url: None,
                link_text: None,
            }]),
        })
        .expect("Failed to start job");

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let job = store.get_job(response.job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Completed);

    let broken = store
        .broken_links_page(response.job_id, 100, 0)
        .expect("query failed");
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].error_type, "connection_error");
}

#[tokio::test]
async fn test_duplicate_links_discovered_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // The same target appears twice on the index and again on /other
    mount_html(
        &mock_server,
        "/",
        format!(
            r#"<html><body>
            <a href="{0}/target">One</a>
            <a href="{0}/target#section">Two</a>
            <a href="{0}/other">Other</a>
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_html(
        &mock_server,
        "/other",
        format!(
            r#"<html><body><a href="{}/target">Three</a></body></html>"#,
            base_url
        ),
    )
    .await;
    mount_html(
        &mock_server,
        "/target",
        "<html><body>t</body></html>".to_string(),
    )
    .await;

    let mut settings = test_settings();
    settings.max_depth = 2;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings,
            pre_analyzed_urls: None,
        })
        .expect("Failed to start job");

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let links = store
        .links_page(response.job_id, LinkCheckState::Checked, 100, 0)
        .expect("query failed");

    let target_rows: Vec<_> = links
        .iter()
        .filter(|l| l.url == format!("{}/target", base_url))
        .collect();
    assert_eq!(target_rows.len(), 1, "Duplicate URL must be stored once");
}

#[tokio::test]
async fn test_external_links_excluded_by_default() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/",
        format!(
            r#"<html><body>
            <a href="{}/internal">In</a>
            <a href="https://external-site.example/page">Out</a>
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_html(
        &mock_server,
        "/internal",
        "<html><body>i</body></html>".to_string(),
    )
    .await;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: None,
        })
        .expect("Failed to start job");

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let total = store.count_links(response.job_id).expect("count failed");
    assert_eq!(total, 1, "External link should not be discovered");
}

#[tokio::test]
async fn test_stopped_job_rejects_run_and_keeps_rows() {
    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: "http://example.com/".to_string(),
            settings: test_settings(),
            pre_analyzed_urls: Some(vec![PreAnalyzedUrl {
                url: "http://example.com/a".to_string(),
                source_url: None,
                link_text: None,
            }]),
        })
        .expect("Failed to start job");

    runner.stop_job(response.job_id).expect("Failed to stop");

    let result = runner.run(response.job_id).await;
    assert!(matches!(result, Err(LinkProbeError::JobNotReady { .. })));

    let store = store.lock().unwrap();
    let job = store.get_job(response.job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(STOPPED_MESSAGE));

    // Partial state survives the stop
    let total = store.count_links(response.job_id).expect("count failed");
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_status_snapshot_over_full_job() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/",
        format!(r#"<html><body><a href="{}/a">a</a></body></html>"#, base_url),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: None,
        })
        .expect("Failed to start job");

    {
        let store = store.lock().unwrap();
        let snapshot = poll_status(&*store, response.job_id).expect("poll failed");
        assert_eq!(snapshot.status, JobStatus::Pending);
        assert_eq!(snapshot.progress.percentage, 0);
    }

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let snapshot = poll_status(&*store, response.job_id).expect("poll failed");
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.progress.current, snapshot.progress.total);
    assert_eq!(snapshot.progress.percentage, 100);
    assert_eq!(snapshot.stats.total_links_discovered, 1);
    assert_eq!(snapshot.stats.broken_links_found, 1);
}

#[tokio::test]
async fn test_checker_respects_concurrency_bound() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&mock_server)
        .await;

    let targets: Vec<CheckTarget> = (0..6)
        .map(|i| CheckTarget {
            url: format!("{}/slow?i={}", base_url, i),
            source_url: format!("{}/", base_url),
            link_text: None,
        })
        .collect();

    let client = build_http_client(5_000).expect("Failed to build client");
    let started = std::time::Instant::now();
    let outcomes = check_batch(&client, &targets, 2, 0)
        .await
        .expect("check failed");
    let elapsed = started.elapsed();

    assert!(outcomes.iter().all(|o| o.is_working));
    // 6 requests of 200ms through 2 slots take at least 3 waves
    assert!(
        elapsed >= Duration::from_millis(500),
        "Finished in {:?}, concurrency bound not respected",
        elapsed
    );
}

/// Store wrapper that fails `mark_link_checked` for one URL, simulating a
/// mid-batch storage fault
struct FlakyStore {
    inner: SqliteStore,
    fail_url: String,
}

impl JobStore for FlakyStore {
    fn create_job(
        &mut self,
        url: &str,
        settings: &JobSettings,
    ) -> Result<i64, StorageError> {
        self.inner.create_job(url, settings)
    }

    fn get_job(&self, job_id: i64) -> Result<linkprobe::storage::JobRecord, StorageError> {
        self.inner.get_job(job_id)
    }

    fn update_job_status(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), StorageError> {
        self.inner.update_job_status(job_id, status, error_message)
    }

    fn update_job_progress(
        &mut self,
        job_id: i64,
        current: u64,
        total: u64,
    ) -> Result<(), StorageError> {
        self.inner.update_job_progress(job_id, current, total)
    }

    fn add_discovered_links(
        &mut self,
        job_id: i64,
        links: &[linkprobe::storage::NewDiscoveredLink],
    ) -> Result<usize, StorageError> {
        self.inner.add_discovered_links(job_id, links)
    }

    fn mark_link_checked(
        &mut self,
        job_id: i64,
        url: &str,
        update: &linkprobe::storage::CheckUpdate,
    ) -> Result<bool, StorageError> {
        if url == self.fail_url {
            return Err(StorageError::Database("injected fault".to_string()));
        }
        self.inner.mark_link_checked(job_id, url, update)
    }

    fn links_page(
        &self,
        job_id: i64,
        state: LinkCheckState,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<linkprobe::storage::DiscoveredLinkRecord>, StorageError> {
        self.inner.links_page(job_id, state, limit, offset)
    }

    fn count_links(&self, job_id: i64) -> Result<u64, StorageError> {
        self.inner.count_links(job_id)
    }

    fn count_links_by_state(
        &self,
        job_id: i64,
        state: LinkCheckState,
    ) -> Result<u64, StorageError> {
        self.inner.count_links_by_state(job_id, state)
    }

    fn add_broken_link(
        &mut self,
        job_id: i64,
        link: &linkprobe::storage::NewBrokenLink,
    ) -> Result<(), StorageError> {
        self.inner.add_broken_link(job_id, link)
    }

    fn broken_links_page(
        &self,
        job_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<linkprobe::storage::BrokenLinkRecord>, StorageError> {
        self.inner.broken_links_page(job_id, limit, offset)
    }

    fn count_broken_links(&self, job_id: i64) -> Result<u64, StorageError> {
        self.inner.count_broken_links(job_id)
    }

    fn results_page(
        &self,
        job_id: i64,
        view: linkprobe::storage::ResultsView,
        limit: usize,
        offset: usize,
    ) -> Result<linkprobe::storage::ResultsPage, StorageError> {
        self.inner.results_page(job_id, view, limit, offset)
    }
}

#[tokio::test]
async fn test_failed_batch_does_not_abort_job() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let store = Arc::new(Mutex::new(FlakyStore {
        inner: SqliteStore::new_in_memory().expect("Failed to open in-memory DB"),
        fail_url: format!("{}/c", base_url),
    }));
    // chunk_size 1 isolates the faulty row into its own batch
    let runner = JobRunner::new(
        store.clone(),
        RunnerConfig {
            chunk_size: 1,
            batch_delay_ms: 0,
            discovery: DiscoveryConfig::default(),
        },
    );

    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: Some(vec![
                PreAnalyzedUrl {
                    url: format!("{}/a", base_url),
                    source_url: None,
                    link_text: None,
                },
                PreAnalyzedUrl {
                    url: format!("{}/b", base_url),
                    source_url: None,
                    link_text: None,
                },
                PreAnalyzedUrl {
                    url: format!("{}/c", base_url),
                    source_url: None,
                    link_text: None,
                },
            ]),
        })
        .expect("Failed to start job");

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let job = store.get_job(response.job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Completed);
    // The faulty batch still counts toward processed work
    assert_eq!(job.progress_current, 3);
    assert_eq!(job.progress_total, 3);

    assert_eq!(
        store
            .count_links_by_state(response.job_id, LinkCheckState::Checked)
            .expect("count failed"),
        2
    );
    assert_eq!(
        store
            .count_broken_links(response.job_id)
            .expect("count failed"),
        1
    );
}

#[tokio::test]
async fn test_job_survives_store_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("linkprobe.db");

    let job_id = {
        let store = Arc::new(Mutex::new(
            linkprobe::storage::open_store(&db_path).expect("Failed to open DB"),
        ));
        let runner = JobRunner::new(
            store,
            RunnerConfig {
                chunk_size: 10,
                batch_delay_ms: 0,
                discovery: DiscoveryConfig::default(),
            },
        );
        runner
            .start_job(StartRequest {
                url: "http://example.com/".to_string(),
                settings: test_settings(),
                pre_analyzed_urls: Some(vec![PreAnalyzedUrl {
                    url: "http://example.com/a".to_string(),
                    source_url: None,
                    link_text: None,
                }]),
            })
            .expect("Failed to start job")
            .job_id
    };

    // A different process opening the same file sees the job
    let store = linkprobe::storage::open_store(&db_path).expect("Failed to reopen DB");
    let job = store.get_job(job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::ReadyForChecking);
    assert_eq!(store.count_links(job_id).expect("count failed"), 1);
}

#[tokio::test]
async fn test_checking_resumes_past_already_checked_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // /a was checked in a previous run and must not be fetched again
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: Some(vec![
                PreAnalyzedUrl {
                    url: format!("{}/a", base_url),
                    source_url: None,
                    link_text: None,
                },
                PreAnalyzedUrl {
                    url: format!("{}/b", base_url),
                    source_url: None,
                    link_text: None,
                },
            ]),
        })
        .expect("Failed to start job");

    {
        let mut store = store.lock().unwrap();
        let update = linkprobe::storage::CheckUpdate {
            is_working: true,
            http_status: Some(200),
            response_time_ms: 5,
            checked_at: chrono::Utc::now().to_rfc3339(),
            error_message: None,
        };
        assert!(store
            .mark_link_checked(response.job_id, &format!("{}/a", base_url), &update)
            .expect("mark failed"));
    }

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let job = store.get_job(response.job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress_current, 2);
    assert_eq!(job.progress_total, 2);
    assert_eq!(
        store
            .count_links_by_state(response.job_id, LinkCheckState::Checked)
            .expect("count failed"),
        2
    );
}

#[tokio::test]
async fn test_crashed_running_job_resumes_checking() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // /a was checked before the crash; a resumed run must not re-fetch it
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: Some(vec![
                PreAnalyzedUrl {
                    url: format!("{}/a", base_url),
                    source_url: None,
                    link_text: None,
                },
                PreAnalyzedUrl {
                    url: format!("{}/b", base_url),
                    source_url: None,
                    link_text: None,
                },
            ]),
        })
        .expect("Failed to start job");

    // Simulate a process that died mid-checking: one link checked, job
    // still marked running
    {
        let mut store = store.lock().unwrap();
        store
            .update_job_status(response.job_id, JobStatus::Running, None)
            .expect("status update failed");
        let update = linkprobe::storage::CheckUpdate {
            is_working: true,
            http_status: Some(200),
            response_time_ms: 5,
            checked_at: chrono::Utc::now().to_rfc3339(),
            error_message: None,
        };
        assert!(store
            .mark_link_checked(response.job_id, &format!("{}/a", base_url), &update)
            .expect("mark failed"));
    }

    runner.run(response.job_id).await.expect("Resume failed");

    let store = store.lock().unwrap();
    let job = store.get_job(response.job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress_current, 2);
    assert_eq!(job.progress_total, 2);
    assert_eq!(
        store
            .count_links_by_state(response.job_id, LinkCheckState::Checked)
            .expect("count failed"),
        2
    );
    assert_eq!(
        store
            .count_broken_links(response.job_id)
            .expect("count failed"),
        1
    );
}

#[tokio::test]
async fn test_progress_monotonic_across_phases() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let index_links: String = (0..5)
        .map(|i| format!(r#"<a href="{}/p{}">p{}</a>"#, base_url, i, i))
        .collect();
    mount_html(
        &mock_server,
        "/",
        format!("<html><body>{}</body></html>", index_links),
    )
    .await;
    for i in 0..5 {
        mount_html(
            &mock_server,
            &format!("/p{}", i),
            format!(
                r#"<html><body><a href="{}/q{}">q</a></body></html>"#,
                base_url, i
            ),
        )
        .await;
        mount_html(
            &mock_server,
            &format!("/q{}", i),
            "<html><body>leaf</body></html>".to_string(),
        )
        .await;
    }

    let store = Arc::new(Mutex::new(
        SqliteStore::new_in_memory().expect("Failed to open in-memory DB"),
    ));
    // Small chunks and a real delay keep the job observable mid-flight
    let runner = Arc::new(JobRunner::new(
        store.clone(),
        RunnerConfig {
            chunk_size: 2,
            batch_delay_ms: 25,
            discovery: DiscoveryConfig::default(),
        },
    ));

    let mut settings = test_settings();
    settings.max_depth = 3;

    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings,
            pre_analyzed_urls: None,
        })
        .expect("Failed to start job");
    let job_id = response.job_id;

    let task = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run(job_id).await })
    };

    // Poll while the job runs; current must never go backwards, including
    // across the discovery-to-checking boundary
    let mut last = 0u64;
    loop {
        let snapshot = {
            let store = store.lock().unwrap();
            poll_status(&*store, job_id).expect("poll failed")
        };
        assert!(
            snapshot.progress.current >= last,
            "progress went backwards: {} -> {}",
            last,
            snapshot.progress.current
        );
        last = snapshot.progress.current;

        if snapshot.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    task.await.expect("task panicked").expect("Job failed");

    let store = store.lock().unwrap();
    let job = store.get_job(job_id).expect("Failed to load job");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress_current, job.progress_total);
    assert_eq!(store.count_links(job_id).expect("count failed"), 10);
}

#[tokio::test]
async fn test_redirect_target_counts_as_working() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/here", base_url).as_str()),
        )
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/here", "<html><body>h</body></html>".to_string()).await;

    let (runner, store) = test_runner();
    let response = runner
        .start_job(StartRequest {
            url: format!("{}/", base_url),
            settings: test_settings(),
            pre_analyzed_urls: Some(vec![PreAnalyzedUrl {
                url: format!("{}/moved", base_url),
                source_url: None,
                link_text: None,
            }]),
        })
        .expect("Failed to start job");

    runner.run(response.job_id).await.expect("Job failed");

    let store = store.lock().unwrap();
    let broken = store
        .count_broken_links(response.job_id)
        .expect("count failed");
    assert_eq!(broken, 0, "Followed redirect should not be reported broken");
}
