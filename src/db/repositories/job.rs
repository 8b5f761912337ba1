//! Job repository
//!
//! Moderation-facing persistence for job postings on SQLite and MySQL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

use super::row::RowExt;
use super::ModerationStore;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateJobInput, Job, JobStatus};

const JOB_COLUMNS: &str = "id, recruiter_id, title, description, status, hidden, hidden_reason, \
     hidden_at, approved_by, approved_at, created_at, updated_at";

/// SQLx-based job repository
pub struct SqlxJobRepository {
    pool: DynDatabasePool,
}

impl SqlxJobRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ModerationStore<Job>> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ModerationStore<Job> for SqlxJobRepository {
    async fn create(&self, input: &CreateJobInput) -> Result<Job> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_job_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_job_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Job>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_job_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_job_by_id_mysql(pool, id).await,
        }
    }

    async fn update_status(
        &self,
        id: i64,
        from: JobStatus,
        to: JobStatus,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                update_job_status_sqlite(pool, id, from, to, admin_id, at).await?
            }
            Backend::Mysql(pool) => {
                update_job_status_mysql(pool, id, from, to, admin_id, at).await?
            }
        };
        Ok(rows == 1)
    }

    async fn set_hidden(&self, id: i64, reason: Option<&str>, at: DateTime<Utc>) -> Result<bool> {
        let rows = match self.pool.backend() {
            Backend::Sqlite(pool) => set_job_hidden_sqlite(pool, id, reason, at).await?,
            Backend::Mysql(pool) => set_job_hidden_mysql(pool, id, reason, at).await?,
        };
        Ok(rows == 1)
    }
}

fn row_to_job(row: &impl RowExt) -> Result<Job> {
    Ok(Job {
        id: row.int("id")?,
        recruiter_id: row.int("recruiter_id")?,
        title: row.text("title")?,
        description: row.text("description")?,
        status: row.parsed("status")?,
        hidden: row.flag("hidden")?,
        hidden_reason: row.opt_text("hidden_reason")?,
        hidden_at: row.opt_timestamp("hidden_at")?,
        approved_by: row.opt_int("approved_by")?,
        approved_at: row.opt_timestamp("approved_at")?,
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
    })
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_job_sqlite(pool: &SqlitePool, input: &CreateJobInput) -> Result<Job> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO jobs (recruiter_id, title, description, status, hidden, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(input.recruiter_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(JobStatus::Pending.as_str())
    .bind(false)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create job")?;

    get_job_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Job missing after insert")
}

async fn get_job_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Job>> {
    let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get job by ID")?;
    row.as_ref().map(row_to_job).transpose()
}

async fn update_job_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    from: JobStatus,
    to: JobStatus,
    admin_id: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs SET status = ?, approved_by = ?, approved_at = ?, updated_at = ? \
         WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(admin_id)
    .bind(at)
    .bind(at)
    .bind(id)
    .bind(from.as_str())
    .execute(pool)
    .await
    .context("Failed to update job status")?;
    Ok(result.rows_affected())
}

async fn set_job_hidden_sqlite(
    pool: &SqlitePool,
    id: i64,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs SET hidden = ?, hidden_reason = ?, hidden_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(reason.is_some())
    .bind(reason)
    .bind(reason.map(|_| at))
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update job visibility")?;
    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_job_mysql(pool: &MySqlPool, input: &CreateJobInput) -> Result<Job> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO jobs (recruiter_id, title, description, status, hidden, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(input.recruiter_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(JobStatus::Pending.as_str())
    .bind(false)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create job")?;

    get_job_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Job missing after insert")
}

async fn get_job_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Job>> {
    let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get job by ID")?;
    row.as_ref().map(row_to_job).transpose()
}

async fn update_job_status_mysql(
    pool: &MySqlPool,
    id: i64,
    from: JobStatus,
    to: JobStatus,
    admin_id: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs SET status = ?, approved_by = ?, approved_at = ?, updated_at = ? \
         WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(admin_id)
    .bind(at)
    .bind(at)
    .bind(id)
    .bind(from.as_str())
    .execute(pool)
    .await
    .context("Failed to update job status")?;
    Ok(result.rows_affected())
}

async fn set_job_hidden_mysql(
    pool: &MySqlPool,
    id: i64,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs SET hidden = ?, hidden_reason = ?, hidden_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(reason.is_some())
    .bind(reason)
    .bind(reason.map(|_| at))
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update job visibility")?;
    Ok(result.rows_affected())
}
