//! Database schema definitions
//!
//! All SQL schema for the linkprobe database lives here.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Link check jobs
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    max_depth INTEGER NOT NULL,
    include_external INTEGER NOT NULL DEFAULT 0,
    timeout_ms INTEGER NOT NULL,
    max_concurrent INTEGER NOT NULL,
    retry_attempts INTEGER NOT NULL,
    progress_current INTEGER NOT NULL DEFAULT 0,
    progress_total INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

-- Links discovered per job; one row per (job, url)
CREATE TABLE IF NOT EXISTS discovered_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    url TEXT NOT NULL,
    source_url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    is_internal INTEGER NOT NULL,
    link_text TEXT,
    check_state TEXT NOT NULL DEFAULT 'pending',
    http_status INTEGER,
    response_time_ms INTEGER,
    checked_at TEXT,
    is_working INTEGER,
    error_message TEXT,
    UNIQUE(job_id, url)
);

CREATE INDEX IF NOT EXISTS idx_discovered_links_state ON discovered_links(job_id, check_state);

-- Broken-link report; one row per (job, url, source page)
CREATE TABLE IF NOT EXISTS broken_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    url TEXT NOT NULL,
    source_url TEXT NOT NULL,
    status_code INTEGER,
    error_type TEXT NOT NULL,
    link_text TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(job_id, url, source_url)
);

CREATE INDEX IF NOT EXISTS idx_broken_links_job ON broken_links(job_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
