//! Append-only job journal.
//!
//! Records every accepted trade decision and each step of its background
//! execution. Rows are only ever inserted:
//! - `trade_jobs`: one row per accepted webhook payload
//! - `job_events`: handoff, start and completion events per job

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Journal connection pool.
#[derive(Clone)]
pub struct Journal {
    pool: SqlitePool,
}

/// Stored job with its most recent event.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredJob {
    pub job_id: String,
    pub symbol: String,
    pub side: String,
    pub received_at: String,
    pub last_event: Option<String>,
}

/// One lifecycle event of a job.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobEvent {
    pub job_id: String,
    pub event: String,
    pub success: Option<bool>,
    pub detail: Option<String>,
    pub created_at: String,
}

impl Journal {
    /// Open (and migrate) the journal at `database_url`.
    pub async fn new(database_url: &str) -> Result<Self> {
        // every connection to :memory: is a separate database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to journal database")?;

        let journal = Self { pool };
        journal.run_migrations().await?;

        Ok(journal)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL UNIQUE,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                payload TEXT NOT NULL,
                received_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                event TEXT NOT NULL,
                success INTEGER,
                detail TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_events_job ON job_events(job_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record an accepted trade decision.
    pub async fn record_job(&self, job_id: &str, symbol: &str, side: &str, payload: &str) -> Result<()> {
        sqlx::query("INSERT INTO trade_jobs (job_id, symbol, side, payload) VALUES (?, ?, ?, ?)")
            .bind(job_id)
            .bind(symbol)
            .bind(side)
            .bind(payload)
            .execute(&self.pool)
            .await
            .context("Failed to record trade job")?;
        Ok(())
    }

    /// Append a lifecycle event for a job.
    pub async fn record_event(
        &self,
        job_id: &str,
        event: &str,
        success: Option<bool>,
        detail: Option<&str>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO job_events (job_id, event, success, detail) VALUES (?, ?, ?, ?)")
            .bind(job_id)
            .bind(event)
            .bind(success)
            .bind(detail)
            .execute(&self.pool)
            .await
            .context("Failed to record job event")?;
        Ok(())
    }

    /// Most recent jobs first.
    pub async fn recent_jobs(&self, limit: i64) -> Result<Vec<StoredJob>> {
        let jobs = sqlx::query_as::<_, StoredJob>(
            r#"
            SELECT j.job_id, j.symbol, j.side, j.received_at,
                   (SELECT e.event FROM job_events e
                     WHERE e.job_id = j.job_id
                     ORDER BY e.id DESC LIMIT 1) AS last_event
            FROM trade_jobs j
            ORDER BY j.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Events of one job in the order they were written.
    pub async fn job_events(&self, job_id: &str) -> Result<Vec<JobEvent>> {
        let events = sqlx::query_as::<_, JobEvent>(
            "SELECT job_id, event, success, detail, created_at FROM job_events WHERE job_id = ? ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
