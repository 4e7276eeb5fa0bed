//! Durable storage for batch jobs.
//!
//! The scheduler treats storage as write-behind: failures are logged by the caller and
//! never roll back in-memory state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::jobs::error::JobError;
use crate::models::batch::{BatchJob, JobMetadata, JobResults, Progress, Timing};

#[async_trait]
pub trait JobPersistence: Send + Sync {
    async fn persist_job(&self, job: &BatchJob) -> Result<(), JobError>;

    async fn update_persisted_job(&self, job: &BatchJob) -> Result<(), JobError>;

    /// Jobs whose status is `pending` or `running`.
    async fn load_unfinished(&self) -> Result<Vec<BatchJob>, JobError>;

    /// Deletes terminal jobs completed before `before`; returns the number removed.
    async fn purge_finished_before(&self, before: DateTime<Utc>) -> Result<u64, JobError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct BatchJobRow {
    id: Uuid,
    job_type: String,
    name: String,
    priority: String,
    status: String,
    progress: Json<Progress>,
    parameters: Json<Value>,
    results: Json<JobResults>,
    timing: Json<Timing>,
    metadata: Json<JobMetadata>,
}

impl TryFrom<BatchJobRow> for BatchJob {
    type Error = JobError;

    fn try_from(row: BatchJobRow) -> Result<Self, Self::Error> {
        Ok(BatchJob {
            id: row.id,
            job_type: row.job_type.parse()?,
            name: row.name,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            progress: row.progress.0,
            parameters: row.parameters.0,
            results: row.results.0,
            timing: row.timing.0,
            metadata: row.metadata.0,
        })
    }
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobPersistence for PgJobStore {
    async fn persist_job(&self, job: &BatchJob) -> Result<(), JobError> {
        sqlx::query(
            "INSERT INTO batch_jobs \
             (id, job_type, name, priority, status, progress, parameters, results, timing, \
              metadata, created_at, completed_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW()) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job.id)
        .bind(job.job_type.as_str())
        .bind(&job.name)
        .bind(job.priority.as_str())
        .bind(job.status.as_str())
        .bind(Json(&job.progress))
        .bind(Json(&job.parameters))
        .bind(Json(&job.results))
        .bind(Json(&job.timing))
        .bind(Json(&job.metadata))
        .bind(job.timing.created_at)
        .bind(job.timing.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_persisted_job(&self, job: &BatchJob) -> Result<(), JobError> {
        let result = sqlx::query(
            "UPDATE batch_jobs SET priority = $2, status = $3, progress = $4, results = $5, \
             timing = $6, metadata = $7, completed_at = $8, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.priority.as_str())
        .bind(job.status.as_str())
        .bind(Json(&job.progress))
        .bind(Json(&job.results))
        .bind(Json(&job.timing))
        .bind(Json(&job.metadata))
        .bind(job.timing.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(JobError::NotFound(job.id));
        }
        Ok(())
    }

    async fn load_unfinished(&self) -> Result<Vec<BatchJob>, JobError> {
        let rows = sqlx::query_as::<_, BatchJobRow>(
            "SELECT id, job_type, name, priority, status, progress, parameters, results, \
             timing, metadata FROM batch_jobs \
             WHERE status IN ('pending', 'running') ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BatchJob::try_from).collect()
    }

    async fn purge_finished_before(&self, before: DateTime<Utc>) -> Result<u64, JobError> {
        let result = sqlx::query(
            "DELETE FROM batch_jobs \
             WHERE status IN ('completed', 'failed', 'cancelled') AND completed_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory (tests)
// ────────────────────────────────────────────────────────────────────────────
