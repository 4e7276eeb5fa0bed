//! `large_scale_matching`: scores every candidate × posting pair and stores those that clear
//! `min_score`.
//!
//! Postings are loaded whole. Candidates are paged by id, `chunk_size` rows at a time, so
//! memory holds one candidate page next to the posting set.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::chunking::{checkpoint, effective_chunk_size, index_chunks, pair_at};
use crate::batch::store::{MatchScoreRecord, TalentStore};
use crate::jobs::error::JobError;
use crate::jobs::registry::{JobContext, JobExecutor};
use crate::matching::engine::ScoringEngine;
use crate::matching::weights::MatchContext;
use crate::models::batch::{JobResults, JobType};

pub const NAME: &str = "large_scale_matching";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingParams {
    /// Explicit candidates; all active candidates when absent.
    #[serde(default)]
    pub candidate_ids: Option<Vec<Uuid>>,
    /// Explicit postings; all open postings when absent.
    #[serde(default)]
    pub job_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub context: MatchContext,
    #[serde(default)]
    pub min_score: f64,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl MatchingParams {
    pub fn expected_total(&self) -> Option<u64> {
        match (&self.candidate_ids, &self.job_ids) {
            (Some(c), Some(j)) => Some(c.len() as u64 * j.len() as u64),
            _ => None,
        }
    }
}

pub(crate) fn validate_min_score(min_score: f64) -> Result<(), JobError> {
    if !(0.0..=100.0).contains(&min_score) {
        return Err(JobError::Validation(format!(
            "min_score must be within 0..=100, got {min_score}"
        )));
    }
    Ok(())
}

pub struct MatchingExecutor {
    store: Arc<dyn TalentStore>,
    engine: ScoringEngine,
    default_chunk_size: usize,
}

impl MatchingExecutor {
    pub fn new(store: Arc<dyn TalentStore>, engine: ScoringEngine, default_chunk_size: usize) -> Self {
        Self {
            store,
            engine,
            default_chunk_size,
        }
    }
}

#[async_trait]
impl JobExecutor for MatchingExecutor {
    fn job_type(&self) -> JobType {
        JobType::Matching
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<(), JobError> {
        let params: MatchingParams = serde_json::from_value(parameters.clone())?;
        validate_min_score(params.min_score)
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResults, JobError> {
        let params: MatchingParams = ctx.parameters()?;
        let ids = params.candidate_ids.as_deref();
        let postings = self.store.load_postings(params.job_ids.as_deref()).await?;
        let candidate_rows = self.store.count_candidates(ids).await?;

        let all_postings = postings.records.len() + postings.rejected.len();
        ctx.progress
            .set_total(candidate_rows * all_postings as u64)
            .await;

        let chunk_size = effective_chunk_size(params.chunk_size, self.default_chunk_size);
        let mut results = JobResults::default();
        let mut candidates = 0usize;
        let mut chunk_index = 0usize;
        let mut scored_pairs = 0u64;
        let mut saved = 0u64;
        let mut degraded = 0u64;
        let mut score_sum = 0.0;

        info!(
            job_id = %ctx.job.id,
            candidates = candidate_rows,
            postings = postings.records.len(),
            chunk_size,
            "Starting large-scale matching"
        );

        let mut after = None;
        'pages: loop {
            let page = self.store.load_candidate_page(ids, after, chunk_size).await?;
            let fetched = page.records.len() + page.rejected.len();
            if fetched == 0 {
                break;
            }
            after = page
                .records
                .iter()
                .map(|c| c.id)
                .chain(page.rejected.iter().map(|r| r.id))
                .max();

            for rejected in &page.rejected {
                results.record_failure(
                    format!("candidate:{}", rejected.id),
                    &rejected.reason,
                    all_postings as u64,
                );
            }
            ctx.progress
                .advance((page.rejected.len() * all_postings) as u64)
                .await;
            candidates += page.records.len();

            let pair_count = page.records.len() * postings.records.len();
            for range in index_chunks(pair_count, chunk_size) {
                let units = range.len() as u64;
                let mut batch = Vec::new();
                let scored_at = Utc::now();

                for index in range {
                    let (c, j) = pair_at(index, postings.records.len());
                    let (candidate, posting) = (&page.records[c], &postings.records[j]);
                    let breakdown = self.engine.score(candidate, posting, &params.context).await;
                    scored_pairs += 1;
                    score_sum += breakdown.overall_score;
                    if breakdown.degraded {
                        degraded += 1;
                    }
                    if breakdown.overall_score >= params.min_score {
                        batch.push(MatchScoreRecord {
                            candidate_id: candidate.id,
                            job_id: posting.id,
                            overall_score: breakdown.overall_score,
                            breakdown,
                            batch_job_id: ctx.job.id,
                            scored_at,
                        });
                    }
                }

                match self.store.save_match_scores(&batch).await {
                    Ok(()) => {
                        saved += batch.len() as u64;
                        results.record_success(units);
                    }
                    Err(e) => {
                        warn!(job_id = %ctx.job.id, chunk_index, error = %e, "Failed to save chunk");
                        results.record_failure(format!("chunk:{chunk_index}"), e.to_string(), units);
                    }
                }
                chunk_index += 1;

                if !checkpoint(&ctx.progress, units).await {
                    info!(job_id = %ctx.job.id, "Matching cancelled between chunks");
                    break 'pages;
                }
            }

            if fetched < chunk_size {
                break;
            }
        }

        // A rejected posting settles its pairs with every valid candidate seen.
        for rejected in &postings.rejected {
            results.record_failure(
                format!("posting:{}", rejected.id),
                &rejected.reason,
                candidates as u64,
            );
        }
        ctx.progress
            .advance((postings.rejected.len() * candidates) as u64)
            .await;

        if degraded > 0 {
            results.warn(format!(
                "{degraded} pairs fell back to comprehensive scoring"
            ));
        }
        let scored = results.successful;
        results.output = Some(json!({
            "candidates": candidates,
            "postings": postings.records.len(),
            "pairs_scored": scored,
            "scores_saved": saved,
            "average_score": if scored_pairs == 0 { 0.0 } else { score_sum / scored_pairs as f64 },
            "algorithm": params.context.algorithm.as_str(),
        }));
        Ok(results)
    }
}
