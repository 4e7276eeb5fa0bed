//! `embedding_updates`: hashed bag-of-terms vectors for candidates and postings.
//!
//! Each content token is hashed with FNV-1a into one of `dimension` buckets; the top bit
//! picks the sign. Vectors are L2-normalized.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::chunking::{checkpoint, effective_chunk_size, index_chunks};
use crate::batch::store::{EmbeddingRecord, EntityKind, TalentStore};
use crate::jobs::error::JobError;
use crate::jobs::registry::{JobContext, JobExecutor};
use crate::matching::skills::content_tokens;
use crate::models::batch::{JobResults, JobType};
use crate::models::candidate::CandidateProfile;
use crate::models::posting::JobPosting;

pub const NAME: &str = "embedding_updates";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const MAX_DIMENSION: usize = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingTarget {
    Candidates,
    Postings,
    #[default]
    Both,
}

fn default_dimension() -> usize {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingParams {
    #[serde(default)]
    pub target: EmbeddingTarget,
    #[serde(default)]
    pub candidate_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub job_ids: Option<Vec<Uuid>>,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self {
            target: EmbeddingTarget::default(),
            candidate_ids: None,
            job_ids: None,
            dimension: default_dimension(),
            chunk_size: None,
        }
    }
}

impl EmbeddingParams {
    pub fn expected_total(&self) -> Option<u64> {
        let candidates = self.candidate_ids.as_ref().map(|ids| ids.len() as u64);
        let postings = self.job_ids.as_ref().map(|ids| ids.len() as u64);
        match self.target {
            EmbeddingTarget::Candidates => candidates,
            EmbeddingTarget::Postings => postings,
            EmbeddingTarget::Both => Some(candidates? + postings?),
        }
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Hashed, signed, L2-normalized term vector. `None` when there is nothing to embed.
pub fn embed_tokens<'a>(texts: impl IntoIterator<Item = &'a str>, dimension: usize) -> Option<Vec<f32>> {
    let tokens = content_tokens(texts);
    if tokens.is_empty() || dimension == 0 {
        return None;
    }
    let mut vector = vec![0f32; dimension];
    for token in &tokens {
        let hash = fnv1a(token);
        let bucket = (hash % dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return None;
    }
    vector.iter_mut().for_each(|v| *v /= norm);
    Some(vector)
}

fn candidate_text(c: &CandidateProfile) -> Vec<&str> {
    let mut texts: Vec<&str> = c.skills.iter().map(|s| s.name.as_str()).collect();
    texts.extend(c.headline.as_deref());
    texts.extend(c.summary.as_deref());
    texts.extend(c.education.iter().filter_map(|e| e.field.as_deref()));
    texts
}

fn posting_text(p: &JobPosting) -> Vec<&str> {
    let mut texts = vec![p.title.as_str(), p.description.as_str()];
    texts.extend(p.required_skills.iter().map(String::as_str));
    texts.extend(p.preferred_skills.iter().map(String::as_str));
    texts
}

pub struct EmbeddingsExecutor {
    store: Arc<dyn TalentStore>,
    default_chunk_size: usize,
}

impl EmbeddingsExecutor {
    pub fn new(store: Arc<dyn TalentStore>, default_chunk_size: usize) -> Self {
        Self {
            store,
            default_chunk_size,
        }
    }

    /// Embeds one chunk of entities and saves it; per-entity failures go to `results`.
    async fn embed_chunk<'a>(
        &self,
        kind: EntityKind,
        entities: impl Iterator<Item = (Uuid, Vec<&'a str>)>,
        dimension: usize,
        results: &mut JobResults,
    ) {
        let generated_at = Utc::now();
        let mut batch = Vec::new();
        for (id, texts) in entities {
            match embed_tokens(texts, dimension) {
                Some(vector) => batch.push(EmbeddingRecord {
                    entity_id: id,
                    kind,
                    vector,
                    generated_at,
                }),
                None => results.record_failure(
                    format!("{}:{id}", kind.as_str()),
                    "no content to embed",
                    1,
                ),
            }
        }

        let count = batch.len() as u64;
        if count == 0 {
            return;
        }
        match self.store.save_embeddings(&batch).await {
            Ok(()) => results.record_success(count),
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "Failed to save embeddings");
                results.record_failure(format!("{}:chunk", kind.as_str()), e.to_string(), count);
            }
        }
    }
}

#[async_trait]
impl JobExecutor for EmbeddingsExecutor {
    fn job_type(&self) -> JobType {
        JobType::Embeddings
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<(), JobError> {
        let params: EmbeddingParams = serde_json::from_value(parameters.clone())?;
        if params.dimension == 0 || params.dimension > MAX_DIMENSION {
            return Err(JobError::Validation(format!(
                "dimension must be within 1..={MAX_DIMENSION}"
            )));
        }
        Ok(())
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResults, JobError> {
        let params: EmbeddingParams = ctx.parameters()?;
        let chunk_size = effective_chunk_size(params.chunk_size, self.default_chunk_size);
        let with_candidates = params.target != EmbeddingTarget::Postings;
        let with_postings = params.target != EmbeddingTarget::Candidates;

        let candidates = if with_candidates {
            Some(self.store.load_candidates(params.candidate_ids.as_deref()).await?)
        } else {
            None
        };
        let postings = if with_postings {
            Some(self.store.load_postings(params.job_ids.as_deref()).await?)
        } else {
            None
        };

        let total = candidates
            .as_ref()
            .map_or(0, |c| c.records.len() + c.rejected.len())
            + postings
                .as_ref()
                .map_or(0, |p| p.records.len() + p.rejected.len());
        ctx.progress.set_total(total as u64).await;

        let mut results = JobResults::default();
        let mut cancelled = false;

        if let Some(loaded) = &candidates {
            for rejected in &loaded.rejected {
                results.record_failure(format!("candidate:{}", rejected.id), &rejected.reason, 1);
            }
            ctx.progress.advance(loaded.rejected.len() as u64).await;
            for range in index_chunks(loaded.records.len(), chunk_size) {
                let units = range.len() as u64;
                let entities = loaded.records[range].iter().map(|c| (c.id, candidate_text(c)));
                self.embed_chunk(EntityKind::Candidate, entities, params.dimension, &mut results)
                    .await;
                if !checkpoint(&ctx.progress, units).await {
                    cancelled = true;
                    break;
                }
            }
        }

        if let Some(loaded) = postings.as_ref().filter(|_| !cancelled) {
            for rejected in &loaded.rejected {
                results.record_failure(format!("posting:{}", rejected.id), &rejected.reason, 1);
            }
            ctx.progress.advance(loaded.rejected.len() as u64).await;
            for range in index_chunks(loaded.records.len(), chunk_size) {
                let units = range.len() as u64;
                let entities = loaded.records[range].iter().map(|p| (p.id, posting_text(p)));
                self.embed_chunk(EntityKind::Posting, entities, params.dimension, &mut results)
                    .await;
                if !checkpoint(&ctx.progress, units).await {
                    break;
                }
            }
        }

        info!(
            job_id = %ctx.job.id,
            embedded = results.successful,
            failed = results.failed,
            "Embedding update finished"
        );
        results.output = Some(json!({
            "embedded": results.successful,
            "dimension": params.dimension,
            "target": params.target,
        }));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::executors::test_support::context_for;
    use crate::batch::store::memory::InMemoryTalentStore;
    use crate::matching::factors::fixtures::{candidate, posting};

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(""), FNV_OFFSET);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_embedding_is_unit_length_and_deterministic() {
        let a = embed_tokens(["Rust services with tokio and axum"], 64).unwrap();
        let b = embed_tokens(["Rust services with tokio and axum"], 64).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_nothing_to_embed() {
        assert!(embed_tokens(["a an to"], 64).is_none());
        assert!(embed_tokens(["rust"], 0).is_none());
    }

    #[tokio::test]
    async fn test_embeds_both_sides_and_reports_empty_profiles() {
        let mut blank = candidate(&[]);
        blank.headline = None;
        blank.education.clear();
        let store = Arc::new(InMemoryTalentStore::seeded(
            vec![candidate(&["rust"]), blank.clone()],
            vec![posting(&["rust"])],
        ));
        let exec = EmbeddingsExecutor::new(store.clone(), 1);
        let ctx = context_for(JobType::Embeddings, NAME, json!({"dimension": 32})).await;
        let results = exec.execute(ctx).await.unwrap();

        assert_eq!(results.successful, 2);
        assert_eq!(results.failed, 1);
        assert_eq!(
            results.errors[0].item.as_deref(),
            Some(format!("candidate:{}", blank.id).as_str())
        );
        let embeddings = store.embeddings.lock().unwrap();
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|e| e.vector.len() == 32));
    }

    #[tokio::test]
    async fn test_postings_only_target() {
        let store = Arc::new(InMemoryTalentStore::seeded(
            vec![candidate(&["rust"])],
            vec![posting(&["go"])],
        ));
        let exec = EmbeddingsExecutor::new(store.clone(), 10);
        let ctx = context_for(JobType::Embeddings, NAME, json!({"target": "postings"})).await;
        let results = exec.execute(ctx).await.unwrap();
        assert_eq!(results.successful, 1);
        assert_eq!(store.embeddings.lock().unwrap()[0].kind, EntityKind::Posting);
    }

    #[test]
    fn test_expected_total() {
        let params = EmbeddingParams {
            candidate_ids: Some(vec![Uuid::new_v4(); 2]),
            job_ids: Some(vec![Uuid::new_v4(); 3]),
            ..EmbeddingParams::default()
        };
        assert_eq!(params.expected_total(), Some(5));
        let partial = EmbeddingParams {
            job_ids: None,
            ..params
        };
        assert_eq!(partial.expected_total(), None);
    }
}
