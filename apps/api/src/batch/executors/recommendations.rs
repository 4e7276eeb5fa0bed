//! `batch_recommendations`: top postings per candidate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::chunking::{checkpoint, effective_chunk_size, index_chunks};
use crate::batch::executors::matching::validate_min_score;
use crate::batch::store::{Recommendation, TalentStore};
use crate::jobs::error::JobError;
use crate::jobs::registry::{JobContext, JobExecutor};
use crate::matching::engine::ScoringEngine;
use crate::matching::weights::MatchContext;
use crate::models::batch::{JobResults, JobType};

pub const NAME: &str = "batch_recommendations";

fn default_limit() -> usize {
    10
}

fn default_min_score() -> f64 {
    50.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationParams {
    #[serde(default)]
    pub candidate_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub job_ids: Option<Vec<Uuid>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default)]
    pub context: MatchContext,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl Default for RecommendationParams {
    fn default() -> Self {
        Self {
            candidate_ids: None,
            job_ids: None,
            limit: default_limit(),
            min_score: default_min_score(),
            context: MatchContext::default(),
            chunk_size: None,
        }
    }
}

impl RecommendationParams {
    /// One unit per candidate.
    pub fn expected_total(&self) -> Option<u64> {
        self.candidate_ids.as_ref().map(|ids| ids.len() as u64)
    }
}

pub struct RecommendationsExecutor {
    store: Arc<dyn TalentStore>,
    engine: ScoringEngine,
    default_chunk_size: usize,
}

impl RecommendationsExecutor {
    pub fn new(store: Arc<dyn TalentStore>, engine: ScoringEngine, default_chunk_size: usize) -> Self {
        Self {
            store,
            engine,
            default_chunk_size,
        }
    }
}

#[async_trait]
impl JobExecutor for RecommendationsExecutor {
    fn job_type(&self) -> JobType {
        JobType::Recommendations
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<(), JobError> {
        let params: RecommendationParams = serde_json::from_value(parameters.clone())?;
        if params.limit == 0 {
            return Err(JobError::Validation("limit must be at least 1".to_string()));
        }
        validate_min_score(params.min_score)
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResults, JobError> {
        let params: RecommendationParams = ctx.parameters()?;
        let candidates = self
            .store
            .load_candidates(params.candidate_ids.as_deref())
            .await?;
        let postings = self.store.load_postings(params.job_ids.as_deref()).await?;

        ctx.progress
            .set_total((candidates.records.len() + candidates.rejected.len()) as u64)
            .await;

        let mut results = JobResults::default();
        for rejected in &candidates.rejected {
            results.record_failure(format!("candidate:{}", rejected.id), &rejected.reason, 1);
        }
        ctx.progress.advance(candidates.rejected.len() as u64).await;
        for rejected in &postings.rejected {
            results.warn(format!("posting {} skipped: {}", rejected.id, rejected.reason));
        }

        let chunk_size = effective_chunk_size(params.chunk_size, self.default_chunk_size);
        let mut generated = 0u64;

        for (chunk_index, range) in index_chunks(candidates.records.len(), chunk_size).enumerate()
        {
            let units = range.len() as u64;
            let generated_at = Utc::now();
            let mut batch = Vec::new();

            for candidate in &candidates.records[range] {
                let mut scored = Vec::with_capacity(postings.records.len());
                for posting in &postings.records {
                    let breakdown = self.engine.score(candidate, posting, &params.context).await;
                    if breakdown.overall_score >= params.min_score {
                        scored.push((posting.id, breakdown.overall_score));
                    }
                }
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));
                scored.truncate(params.limit);

                batch.extend(scored.into_iter().enumerate().map(|(i, (job_id, score))| {
                    Recommendation {
                        candidate_id: candidate.id,
                        job_id,
                        rank: i as u32 + 1,
                        score,
                        batch_job_id: ctx.job.id,
                        generated_at,
                    }
                }));
            }

            match self.store.save_recommendations(&batch).await {
                Ok(()) => {
                    generated += batch.len() as u64;
                    results.record_success(units);
                }
                Err(e) => {
                    warn!(job_id = %ctx.job.id, chunk_index, error = %e, "Failed to save chunk");
                    results.record_failure(format!("chunk:{chunk_index}"), e.to_string(), units);
                }
            }

            if !checkpoint(&ctx.progress, units).await {
                info!(job_id = %ctx.job.id, "Recommendations cancelled between chunks");
                break;
            }
        }

        results.output = Some(json!({
            "candidates": candidates.records.len(),
            "postings": postings.records.len(),
            "recommendations": generated,
            "limit": params.limit,
        }));
        Ok(results)
    }
}
