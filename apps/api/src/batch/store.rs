//! Talent data access for batch executors: candidate and posting loads, derived-data writes.
//!
//! Rows are validated at this boundary. Records that fail conversion are returned as
//! rejects so executors can report them per item instead of failing the job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::jobs::error::JobError;
use crate::matching::engine::ScoreBreakdown;
use crate::models::candidate::{CandidateProfile, CandidateRow};
use crate::models::posting::{JobPosting, JobPostingRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for JobError {
    fn from(e: StoreError) -> Self {
        JobError::Handler(format!("talent store: {e}"))
    }
}

/// A record that failed boundary validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejected {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub rejected: Vec<Rejected>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Loaded<T> {
    /// Splits converted rows into valid records and rejects.
    pub fn partition<R, E>(rows: Vec<R>, id_of: impl Fn(&R) -> Uuid) -> Self
    where
        T: TryFrom<R, Error = E>,
        E: std::fmt::Display,
    {
        let mut loaded = Self::default();
        for row in rows {
            let id = id_of(&row);
            match T::try_from(row) {
                Ok(record) => loaded.records.push(record),
                Err(e) => loaded.rejected.push(Rejected {
                    id,
                    reason: e.to_string(),
                }),
            }
        }
        loaded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScoreRecord {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub overall_score: f64,
    pub breakdown: ScoreBreakdown,
    pub batch_job_id: Uuid,
    pub scored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub rank: u32,
    pub score: f64,
    pub batch_job_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Candidate,
    Posting,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Candidate => "candidate",
            EntityKind::Posting => "posting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub entity_id: Uuid,
    pub kind: EntityKind,
    pub vector: Vec<f32>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgedCounts {
    pub match_scores: u64,
    pub recommendations: u64,
}

#[async_trait]
pub trait TalentStore: Send + Sync {
    /// Active candidates, or exactly `ids` when given.
    async fn load_candidates(
        &self,
        ids: Option<&[Uuid]>,
    ) -> Result<Loaded<CandidateProfile>, StoreError>;

    /// Rows `load_candidate_page` walks for the same `ids`, rejects included.
    async fn count_candidates(&self, ids: Option<&[Uuid]>) -> Result<u64, StoreError>;

    /// Up to `limit` candidate rows ordered by id, starting strictly after `after`.
    async fn load_candidate_page(
        &self,
        ids: Option<&[Uuid]>,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Loaded<CandidateProfile>, StoreError>;

    /// Open postings, or exactly `ids` when given.
    async fn load_postings(&self, ids: Option<&[Uuid]>) -> Result<Loaded<JobPosting>, StoreError>;

    async fn save_match_scores(&self, scores: &[MatchScoreRecord]) -> Result<(), StoreError>;

    /// Replaces the stored recommendations of each candidate present in `recommendations`.
    async fn save_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> Result<(), StoreError>;

    async fn save_embeddings(&self, embeddings: &[EmbeddingRecord]) -> Result<(), StoreError>;

    async fn load_match_scores(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MatchScoreRecord>, StoreError>;

    /// Deletes match scores and recommendations produced before `before`.
    async fn purge_stale(&self, before: DateTime<Utc>) -> Result<PurgedCounts, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

const CANDIDATE_COLUMNS: &str = "id, full_name, headline, summary, skills, experience_level, \
     years_of_experience, location, open_to_remote, willing_to_relocate, education, is_active, \
     last_login_at, updated_at, desired_salary_min, desired_salary_max, preferred_work_modes";

const POSTING_COLUMNS: &str = "id, employer_id, title, description, required_skills, \
     preferred_skills, experience_level, location, work_mode, required_education, \
     preferred_education, salary_min, salary_max, posted_at, applications_count, \
     successful_applicant_skills";

#[derive(Debug, FromRow)]
struct MatchScoreRow {
    candidate_id: Uuid,
    job_id: Uuid,
    overall_score: f64,
    breakdown: Json<ScoreBreakdown>,
    batch_job_id: Uuid,
    scored_at: DateTime<Utc>,
}

pub struct PgTalentStore {
    pool: PgPool,
}

impl PgTalentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TalentStore for PgTalentStore {
    async fn load_candidates(
        &self,
        ids: Option<&[Uuid]>,
    ) -> Result<Loaded<CandidateProfile>, StoreError> {
        let rows = match ids {
            Some(ids) => {
                sqlx::query_as::<_, CandidateRow>(&format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = ANY($1) ORDER BY id"
                ))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CandidateRow>(&format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE is_active ORDER BY id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        debug!(rows = rows.len(), "Loaded candidate rows");
        Ok(Loaded::partition(rows, |r: &CandidateRow| r.id))
    }

    async fn count_candidates(&self, ids: Option<&[Uuid]>) -> Result<u64, StoreError> {
        let count: i64 = match ids {
            Some(ids) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM candidates WHERE id = ANY($1)")
                    .bind(ids)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM candidates WHERE is_active")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count.max(0) as u64)
    }

    async fn load_candidate_page(
        &self,
        ids: Option<&[Uuid]>,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Loaded<CandidateProfile>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match ids {
            Some(ids) => {
                sqlx::query_as::<_, CandidateRow>(&format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM candidates \
                     WHERE id = ANY($1) AND ($2::uuid IS NULL OR id > $2) ORDER BY id LIMIT $3"
                ))
                .bind(ids)
                .bind(after)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CandidateRow>(&format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM candidates \
                     WHERE is_active AND ($1::uuid IS NULL OR id > $1) ORDER BY id LIMIT $2"
                ))
                .bind(after)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        debug!(rows = rows.len(), ?after, "Loaded candidate page");
        Ok(Loaded::partition(rows, |r: &CandidateRow| r.id))
    }

    async fn load_postings(&self, ids: Option<&[Uuid]>) -> Result<Loaded<JobPosting>, StoreError> {
        let rows = match ids {
            Some(ids) => {
                sqlx::query_as::<_, JobPostingRow>(&format!(
                    "SELECT {POSTING_COLUMNS} FROM job_postings WHERE id = ANY($1) ORDER BY id"
                ))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobPostingRow>(&format!(
                    "SELECT {POSTING_COLUMNS} FROM job_postings WHERE closed_at IS NULL ORDER BY id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        debug!(rows = rows.len(), "Loaded posting rows");
        Ok(Loaded::partition(rows, |r: &JobPostingRow| r.id))
    }

    async fn save_match_scores(&self, scores: &[MatchScoreRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for score in scores {
            sqlx::query(
                "INSERT INTO match_scores \
                 (candidate_id, job_id, overall_score, breakdown, batch_job_id, scored_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (candidate_id, job_id) DO UPDATE SET \
                 overall_score = EXCLUDED.overall_score, breakdown = EXCLUDED.breakdown, \
                 batch_job_id = EXCLUDED.batch_job_id, scored_at = EXCLUDED.scored_at",
            )
            .bind(score.candidate_id)
            .bind(score.job_id)
            .bind(score.overall_score)
            .bind(Json(&score.breakdown))
            .bind(score.batch_job_id)
            .bind(score.scored_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> Result<(), StoreError> {
        let mut candidates: Vec<Uuid> = recommendations.iter().map(|r| r.candidate_id).collect();
        candidates.sort_unstable();
        candidates.dedup();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM recommendations WHERE candidate_id = ANY($1)")
            .bind(&candidates)
            .execute(&mut *tx)
            .await?;
        for rec in recommendations {
            sqlx::query(
                "INSERT INTO recommendations \
                 (candidate_id, job_id, rank, score, batch_job_id, generated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(rec.candidate_id)
            .bind(rec.job_id)
            .bind(rec.rank as i32)
            .bind(rec.score)
            .bind(rec.batch_job_id)
            .bind(rec.generated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_embeddings(&self, embeddings: &[EmbeddingRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for embedding in embeddings {
            sqlx::query(
                "INSERT INTO embeddings (entity_id, kind, vector, generated_at) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (entity_id, kind) DO UPDATE SET \
                 vector = EXCLUDED.vector, generated_at = EXCLUDED.generated_at",
            )
            .bind(embedding.entity_id)
            .bind(embedding.kind.as_str())
            .bind(&embedding.vector)
            .bind(embedding.generated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_match_scores(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MatchScoreRecord>, StoreError> {
        let rows = sqlx::query_as::<_, MatchScoreRow>(
            "SELECT candidate_id, job_id, overall_score, breakdown, batch_job_id, scored_at \
             FROM match_scores WHERE scored_at >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| MatchScoreRecord {
                candidate_id: r.candidate_id,
                job_id: r.job_id,
                overall_score: r.overall_score,
                breakdown: r.breakdown.0,
                batch_job_id: r.batch_job_id,
                scored_at: r.scored_at,
            })
            .collect())
    }

    async fn purge_stale(&self, before: DateTime<Utc>) -> Result<PurgedCounts, StoreError> {
        let scores = sqlx::query("DELETE FROM match_scores WHERE scored_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        let recommendations = sqlx::query("DELETE FROM recommendations WHERE generated_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(PurgedCounts {
            match_scores: scores.rows_affected(),
            recommendations: recommendations.rows_affected(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory (tests)
// ────────────────────────────────────────────────────────────────────────────
