//! SQLite job registry implementation

use crate::config::JobSettings;
use crate::job::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, StorageError, StorageResult};
use crate::storage::{
    BrokenLinkRecord, CheckUpdate, DiscoveredLinkRecord, JobRecord, LinkCheckState, NewBrokenLink,
    NewDiscoveredLink, ResultsPage, ResultsView,
};
use crate::LinkProbeError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// Upper bound on rows per bulk-insert transaction
const INSERT_CHUNK_SIZE: usize = 100;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a job database at the given path
    pub fn new(path: &Path) -> Result<Self, LinkProbeError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, LinkProbeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn job_from_row(row: &Row) -> rusqlite::Result<JobRecord> {
        Ok(JobRecord {
            id: row.get(0)?,
            url: row.get(1)?,
            status: JobStatus::from_db_string(&row.get::<_, String>(2)?)
                .unwrap_or(JobStatus::Failed),
            settings: JobSettings {
                max_depth: row.get(3)?,
                include_external: row.get(4)?,
                timeout_ms: row.get(5)?,
                max_concurrent: row.get::<_, i64>(6)? as usize,
                retry_attempts: row.get(7)?,
            },
            progress_current: row.get::<_, i64>(8)? as u64,
            progress_total: row.get::<_, i64>(9)? as u64,
            created_at: row.get(10)?,
            completed_at: row.get(11)?,
            error_message: row.get(12)?,
        })
    }

    fn link_from_row(row: &Row) -> rusqlite::Result<DiscoveredLinkRecord> {
        Ok(DiscoveredLinkRecord {
            id: row.get(0)?,
            job_id: row.get(1)?,
            url: row.get(2)?,
            source_url: row.get(3)?,
            depth: row.get(4)?,
            is_internal: row.get(5)?,
            link_text: row.get(6)?,
            check_state: LinkCheckState::from_db_string(&row.get::<_, String>(7)?)
                .unwrap_or(LinkCheckState::Pending),
            http_status: row.get(8)?,
            response_time_ms: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
            checked_at: row.get(10)?,
            is_working: row.get(11)?,
            error_message: row.get(12)?,
        })
    }
}

const JOB_COLUMNS: &str = "id, url, status, max_depth, include_external, timeout_ms, \
     max_concurrent, retry_attempts, progress_current, progress_total, \
     created_at, completed_at, error_message";

const LINK_COLUMNS: &str = "id, job_id, url, source_url, depth, is_internal, link_text, \
     check_state, http_status, response_time_ms, checked_at, is_working, error_message";

impl JobStore for SqliteStore {
    // ===== Job Lifecycle =====

    fn create_job(&mut self, url: &str, settings: &JobSettings) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (url, status, max_depth, include_external, timeout_ms,
             max_concurrent, retry_attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                url,
                JobStatus::Pending.to_db_string(),
                settings.max_depth,
                settings.include_external,
                settings.timeout_ms as i64,
                settings.max_concurrent as i64,
                settings.retry_attempts,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS))?;

        let job = stmt
            .query_row(params![job_id], Self::job_from_row)
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))?;

        Ok(job)
    }

    fn update_job_status(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let current = self.get_job(job_id)?.status;
        if !current.can_transition_to(status) {
            return Err(StorageError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        if status.is_terminal() {
            let now = Utc::now().to_rfc3339();
            self.conn.execute(
                "UPDATE jobs SET status = ?1, error_message = ?2, completed_at = ?3 WHERE id = ?4",
                params![status.to_db_string(), error_message, now, job_id],
            )?;
        } else {
            self.conn.execute(
                "UPDATE jobs SET status = ?1, error_message = ?2 WHERE id = ?3",
                params![status.to_db_string(), error_message, job_id],
            )?;
        }
        Ok(())
    }

    fn update_job_progress(&mut self, job_id: i64, current: u64, total: u64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE jobs SET progress_current = ?1, progress_total = ?2 WHERE id = ?3",
            params![current as i64, total as i64, job_id],
        )?;
        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    // ===== Discovered Links =====

    fn add_discovered_links(
        &mut self,
        job_id: i64,
        links: &[NewDiscoveredLink],
    ) -> StorageResult<usize> {
        let mut inserted = 0;

        for chunk in links.chunks(INSERT_CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            for link in chunk {
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO discovered_links
                     (job_id, url, source_url, depth, is_internal, link_text, check_state)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending')",
                    params![
                        job_id,
                        link.url,
                        link.source_url,
                        link.depth,
                        link.is_internal,
                        link.link_text
                    ],
                )?;
            }
            tx.commit()?;
        }

        Ok(inserted)
    }

    fn mark_link_checked(
        &mut self,
        job_id: i64,
        url: &str,
        update: &CheckUpdate,
    ) -> StorageResult<bool> {
        // Guarded on check_state so a link is only ever checked once per job
        let updated = self.conn.execute(
            "UPDATE discovered_links
             SET check_state = 'checked', is_working = ?1, http_status = ?2,
                 response_time_ms = ?3, checked_at = ?4, error_message = ?5
             WHERE job_id = ?6 AND url = ?7 AND check_state = 'pending'",
            params![
                update.is_working,
                update.http_status,
                update.response_time_ms as i64,
                update.checked_at,
                update.error_message,
                job_id,
                url
            ],
        )?;
        Ok(updated > 0)
    }

    fn links_page(
        &self,
        job_id: i64,
        state: LinkCheckState,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<DiscoveredLinkRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM discovered_links
             WHERE job_id = ?1 AND check_state = ?2
             ORDER BY id LIMIT ?3 OFFSET ?4",
            LINK_COLUMNS
        ))?;

        let links = stmt
            .query_map(
                params![job_id, state.to_db_string(), limit as i64, offset as i64],
                Self::link_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    fn count_links(&self, job_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM discovered_links WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_links_by_state(&self, job_id: i64, state: LinkCheckState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM discovered_links WHERE job_id = ?1 AND check_state = ?2",
            params![job_id, state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Broken Links =====

    fn add_broken_link(&mut self, job_id: i64, link: &NewBrokenLink) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO broken_links
             (job_id, url, source_url, status_code, error_type, link_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                job_id,
                link.url,
                link.source_url,
                link.status_code,
                link.error_type,
                link.link_text,
                now
            ],
        )?;
        Ok(())
    }

    fn broken_links_page(
        &self,
        job_id: i64,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<BrokenLinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, url, source_url, status_code, error_type, link_text, created_at
             FROM broken_links WHERE job_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?;

        let links = stmt
            .query_map(params![job_id, limit as i64, offset as i64], |row| {
                Ok(BrokenLinkRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    url: row.get(2)?,
                    source_url: row.get(3)?,
                    status_code: row.get(4)?,
                    error_type: row.get(5)?,
                    link_text: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    fn count_broken_links(&self, job_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM broken_links WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Result Views =====

    fn results_page(
        &self,
        job_id: i64,
        view: ResultsView,
        limit: usize,
        offset: usize,
    ) -> StorageResult<ResultsPage> {
        match view {
            ResultsView::All => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM discovered_links
                     WHERE job_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
                    LINK_COLUMNS
                ))?;
                let links = stmt
                    .query_map(
                        params![job_id, limit as i64, offset as i64],
                        Self::link_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ResultsPage::Links(links))
            }
            ResultsView::Working => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM discovered_links
                     WHERE job_id = ?1 AND is_working = 1
                     ORDER BY id LIMIT ?2 OFFSET ?3",
                    LINK_COLUMNS
                ))?;
                let links = stmt
                    .query_map(
                        params![job_id, limit as i64, offset as i64],
                        Self::link_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ResultsPage::Links(links))
            }
            ResultsView::Broken => {
                let rows = self.broken_links_page(job_id, limit, offset)?;
                Ok(ResultsPage::Broken(rows))
            }
            ResultsView::Pages => {
                let mut stmt = self.conn.prepare(
                    "SELECT DISTINCT source_url FROM discovered_links
                     WHERE job_id = ?1 ORDER BY source_url LIMIT ?2 OFFSET ?3",
                )?;
                let pages = stmt
                    .query_map(params![job_id, limit as i64, offset as i64], |row| {
                        row.get::<_, String>(0)
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ResultsPage::Pages(pages))
            }
        }
    }
}
