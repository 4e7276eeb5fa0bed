//! Score adjustment seam for the ML-enhanced and collaborative variants.
//!
//! Default: `HeuristicAdjuster` (deterministic, in-process).
//! Alternative: `ModelServiceAdjuster` (HTTP model service, see `model_service`).
//!
//! The engine holds an `Arc<dyn ScoreAdjuster>`; failures never reach callers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matching::skills::exact_overlap;
use crate::models::candidate::CandidateProfile;
use crate::models::posting::JobPosting;

#[derive(Debug, Error)]
pub enum AdjustmentError {
    #[error("adjustment unavailable: {0}")]
    Unavailable(String),

    #[error("model service error: {0}")]
    Service(String),

    #[error("invalid adjustment: {0}")]
    Invalid(String),
}

/// Feature vector handed to the ML adjustment step (baseline sub-scores, 0-100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFeatures {
    pub skills: f64,
    pub experience: f64,
    pub location: f64,
    pub education: f64,
    pub availability: f64,
    pub recent_activity: f64,
    pub baseline_overall: f64,
}

/// Multipliers applied to the baseline sub-scores plus a success probability in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlAdjustment {
    pub skills_multiplier: f64,
    pub experience_multiplier: f64,
    pub location_multiplier: f64,
    pub education_multiplier: f64,
    pub success_probability: f64,
}

impl MlAdjustment {
    /// Rejects non-finite values; clamps multipliers to [0.5, 1.5] and probability to [0, 1].
    pub fn sanitized(self) -> Result<Self, AdjustmentError> {
        let values = [
            self.skills_multiplier,
            self.experience_multiplier,
            self.location_multiplier,
            self.education_multiplier,
            self.success_probability,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AdjustmentError::Invalid("non-finite value".to_string()));
        }
        let clamp = |m: f64| m.clamp(0.5, 1.5);
        Ok(Self {
            skills_multiplier: clamp(self.skills_multiplier),
            experience_multiplier: clamp(self.experience_multiplier),
            location_multiplier: clamp(self.location_multiplier),
            education_multiplier: clamp(self.education_multiplier),
            success_probability: self.success_probability.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
pub trait ScoreAdjuster: Send + Sync {
    async fn ml_adjustment(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
        features: &MatchFeatures,
    ) -> Result<MlAdjustment, AdjustmentError>;

    /// Score in [0, 100] derived from how similar candidates fared on this posting.
    async fn collaborative_score(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
    ) -> Result<f64, AdjustmentError>;

    fn name(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicAdjuster
// ────────────────────────────────────────────────────────────────────────────

/// In-process adjuster.
///
/// ML step: success probability is a logistic curve over the weighted baseline features;
/// multipliers nudge strong factors up and weak factors down by at most 10%.
/// Collaborative step: overlap with skills of applicants who previously advanced.
pub struct HeuristicAdjuster;

fn nudge(score: f64) -> f64 {
    // 50 → 1.0, 100 → 1.1, 0 → 0.9
    1.0 + (score - 50.0) / 500.0
}

#[async_trait]
impl ScoreAdjuster for HeuristicAdjuster {
    async fn ml_adjustment(
        &self,
        _candidate: &CandidateProfile,
        _job: &JobPosting,
        features: &MatchFeatures,
    ) -> Result<MlAdjustment, AdjustmentError> {
        let z = 0.06 * (features.skills - 50.0) * 0.5
            + 0.06 * (features.experience - 50.0) * 0.3
            + 0.06 * (features.availability - 50.0) * 0.2;
        let success_probability = 1.0 / (1.0 + (-z / 3.0).exp());

        MlAdjustment {
            skills_multiplier: nudge(features.skills),
            experience_multiplier: nudge(features.experience),
            location_multiplier: nudge(features.location),
            education_multiplier: nudge(features.education),
            success_probability,
        }
        .sanitized()
    }

    async fn collaborative_score(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
    ) -> Result<f64, AdjustmentError> {
        if job.successful_applicant_skills.is_empty() {
            return Err(AdjustmentError::Unavailable(format!(
                "posting {} has no applicant history",
                job.id
            )));
        }
        Ok(100.0 * exact_overlap(&candidate.skills, &job.successful_applicant_skills))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}
