//! Scoring engine: candidate × posting → `ScoreBreakdown` for five algorithm variants.
//!
//! Comprehensive, weighted, and content-based scoring are pure functions of
//! (candidate, posting, context). ML-enhanced and collaborative scoring consult a
//! `ScoreAdjuster`; if that fails the comprehensive result is returned with
//! `degraded = true`. `score` never returns an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::matching::adjuster::{MatchFeatures, ScoreAdjuster};
use crate::matching::factors::{
    availability_score, education_score, experience_score, level_distance, location_score,
    recent_activity_score, simple_education_score, simple_location_score,
};
use crate::matching::skills::{assess_skills, content_tokens, exact_overlap, jaccard};
use crate::matching::weights::{Algorithm, MatchContext, ScoringWeights};
use crate::models::candidate::CandidateProfile;
use crate::models::posting::JobPosting;

/// Maximum points the content-alignment term adds in content-based scoring.
const CONTENT_BONUS_MAX: f64 = 10.0;
const ML_BLEND: f64 = 0.2;
const COLLABORATIVE_BLEND: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub overall_score: f64,
    pub skills_match: f64,
    pub experience_match: f64,
    pub location_match: f64,
    pub education_match: f64,
    pub availability_match: f64,
    pub recent_activity: f64,
    /// Variant whose result is reported.
    pub algorithm: Algorithm,
    /// True when an augmentation step failed and the comprehensive baseline was returned.
    pub degraded: bool,
}

impl ScoreBreakdown {
    fn from_factors(factors: Factors, weights: &ScoringWeights, algorithm: Algorithm) -> Self {
        let overall = factors.weighted_sum(weights);
        Self {
            overall_score: clamp_score(overall),
            skills_match: factors.skills,
            experience_match: factors.experience,
            location_match: factors.location,
            education_match: factors.education,
            availability_match: factors.availability,
            recent_activity: factors.recent_activity,
            algorithm,
            degraded: false,
        }
    }

    fn features(&self) -> MatchFeatures {
        MatchFeatures {
            skills: self.skills_match,
            experience: self.experience_match,
            location: self.location_match,
            education: self.education_match,
            availability: self.availability_match,
            recent_activity: self.recent_activity,
            baseline_overall: self.overall_score,
        }
    }
}

/// Clamps to [0, 100] and rounds to two decimals; NaN becomes 0.
pub(crate) fn clamp_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy)]
struct Factors {
    skills: f64,
    experience: f64,
    location: f64,
    education: f64,
    availability: f64,
    recent_activity: f64,
}

impl Factors {
    fn weighted_sum(&self, w: &ScoringWeights) -> f64 {
        w.skills * self.skills
            + w.experience * self.experience
            + w.location * self.location
            + w.education * self.education
            + w.availability * self.availability
            + w.recent_activity * self.recent_activity
    }
}

/// The scoring engine. Cheap to clone; shares the adjuster.
#[derive(Clone)]
pub struct ScoringEngine {
    adjuster: Arc<dyn ScoreAdjuster>,
}

impl ScoringEngine {
    pub fn new(adjuster: Arc<dyn ScoreAdjuster>) -> Self {
        Self { adjuster }
    }

    pub fn adjuster_name(&self) -> &'static str {
        self.adjuster.name()
    }

    pub async fn score(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
        context: &MatchContext,
    ) -> ScoreBreakdown {
        match context.algorithm {
            Algorithm::Comprehensive => comprehensive(candidate, job, context),
            Algorithm::Weighted => weighted(candidate, job, context),
            Algorithm::ContentBased => content_based(candidate, job, context),
            Algorithm::MlEnhanced => self.ml_enhanced(candidate, job, context).await,
            Algorithm::Collaborative => self.collaborative(candidate, job, context).await,
        }
    }

    async fn ml_enhanced(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
        context: &MatchContext,
    ) -> ScoreBreakdown {
        let base = comprehensive(candidate, job, context);
        let adjustment = match self
            .adjuster
            .ml_adjustment(candidate, job, &base.features())
            .await
        {
            Ok(a) => a,
            Err(e) => {
                warn!(
                    candidate_id = %candidate.id,
                    job_id = %job.id,
                    error = %e,
                    "ML adjustment failed, using comprehensive score"
                );
                return degraded(base);
            }
        };

        let factors = Factors {
            skills: (base.skills_match * adjustment.skills_multiplier).min(100.0),
            experience: (base.experience_match * adjustment.experience_multiplier).min(100.0),
            location: (base.location_match * adjustment.location_multiplier).min(100.0),
            education: (base.education_match * adjustment.education_multiplier).min(100.0),
            availability: base.availability_match,
            recent_activity: base.recent_activity,
        };
        let weights = context.weights.sanitized();
        let mut result = ScoreBreakdown::from_factors(factors, &weights, Algorithm::MlEnhanced);
        result.overall_score = clamp_score(
            (1.0 - ML_BLEND) * result.overall_score
                + ML_BLEND * adjustment.success_probability * 100.0,
        );
        result
    }

    async fn collaborative(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
        context: &MatchContext,
    ) -> ScoreBreakdown {
        let base = comprehensive(candidate, job, context);
        match self.adjuster.collaborative_score(candidate, job).await {
            Ok(collab) => ScoreBreakdown {
                overall_score: clamp_score(
                    (1.0 - COLLABORATIVE_BLEND) * base.overall_score
                        + COLLABORATIVE_BLEND * collab.clamp(0.0, 100.0),
                ),
                algorithm: Algorithm::Collaborative,
                ..base
            },
            Err(e) => {
                warn!(
                    candidate_id = %candidate.id,
                    job_id = %job.id,
                    error = %e,
                    "Collaborative scoring failed, using comprehensive score"
                );
                degraded(base)
            }
        }
    }
}

fn degraded(mut base: ScoreBreakdown) -> ScoreBreakdown {
    base.degraded = true;
    base
}

/// Full factor set with semantic skills matching.
pub fn comprehensive(
    candidate: &CandidateProfile,
    job: &JobPosting,
    context: &MatchContext,
) -> ScoreBreakdown {
    let factors = comprehensive_factors(candidate, job, context);
    ScoreBreakdown::from_factors(
        factors,
        &context.weights.sanitized(),
        Algorithm::Comprehensive,
    )
}

fn comprehensive_factors(
    candidate: &CandidateProfile,
    job: &JobPosting,
    context: &MatchContext,
) -> Factors {
    Factors {
        skills: assess_skills(&candidate.skills, &job.required_skills, &job.preferred_skills)
            .score,
        experience: experience_score(candidate, job),
        location: location_score(candidate, job),
        education: education_score(candidate, job),
        availability: availability_score(candidate, context.as_of),
        recent_activity: recent_activity_score(candidate, context.as_of),
    }
}

/// Ratio heuristics scaled by the context weights, plus the employer boost.
pub fn weighted(
    candidate: &CandidateProfile,
    job: &JobPosting,
    context: &MatchContext,
) -> ScoreBreakdown {
    let distance = level_distance(candidate.experience_level, job.experience_level);
    let factors = Factors {
        skills: 100.0 * exact_overlap(&candidate.skills, &job.required_skills),
        experience: (100.0 - 25.0 * distance as f64).max(0.0),
        location: simple_location_score(candidate, job),
        education: simple_education_score(candidate),
        availability: availability_score(candidate, context.as_of),
        recent_activity: recent_activity_score(candidate, context.as_of),
    };
    let mut result =
        ScoreBreakdown::from_factors(factors, &context.weights.sanitized(), Algorithm::Weighted);

    if let Some(prefs) = &context.employer_preferences {
        if !prefs.preferred_skills.is_empty() && prefs.boost.is_finite() && prefs.boost > 0.0 {
            let overlap = exact_overlap(&candidate.skills, &prefs.preferred_skills);
            result.overall_score = clamp_score(result.overall_score + prefs.boost * overlap);
        }
    }
    result
}

/// Skills-heavy distribution plus a content-alignment bonus.
pub fn content_based(
    candidate: &CandidateProfile,
    job: &JobPosting,
    context: &MatchContext,
) -> ScoreBreakdown {
    let factors = comprehensive_factors(candidate, job, context);
    let mut result = ScoreBreakdown::from_factors(
        factors,
        &ScoringWeights::content_based(),
        Algorithm::ContentBased,
    );

    let candidate_text = candidate
        .headline
        .iter()
        .chain(candidate.summary.iter())
        .map(String::as_str)
        .chain(candidate.skills.iter().map(|s| s.name.as_str()));
    let job_text = [job.title.as_str(), job.description.as_str()]
        .into_iter()
        .chain(job.required_skills.iter().map(String::as_str))
        .chain(job.preferred_skills.iter().map(String::as_str));
    let alignment = jaccard(&content_tokens(candidate_text), &content_tokens(job_text));

    result.overall_score = clamp_score(result.overall_score + CONTENT_BONUS_MAX * alignment);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::adjuster::{AdjustmentError, HeuristicAdjuster, MlAdjustment};
    use crate::matching::factors::fixtures::{as_of, candidate, posting};
    use crate::matching::weights::EmployerPreferences;
    use async_trait::async_trait;

    struct FailingAdjuster;

    #[async_trait]
    impl ScoreAdjuster for FailingAdjuster {
        async fn ml_adjustment(
            &self,
            _c: &CandidateProfile,
            _j: &JobPosting,
            _f: &MatchFeatures,
        ) -> Result<MlAdjustment, AdjustmentError> {
            Err(AdjustmentError::Service("connection refused".to_string()))
        }

        async fn collaborative_score(
            &self,
            _c: &CandidateProfile,
            _j: &JobPosting,
        ) -> Result<f64, AdjustmentError> {
            Err(AdjustmentError::Unavailable("no history".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct FixedAdjuster(MlAdjustment, f64);

    #[async_trait]
    impl ScoreAdjuster for FixedAdjuster {
        async fn ml_adjustment(
            &self,
            _c: &CandidateProfile,
            _j: &JobPosting,
            _f: &MatchFeatures,
        ) -> Result<MlAdjustment, AdjustmentError> {
            Ok(self.0.clone())
        }

        async fn collaborative_score(
            &self,
            _c: &CandidateProfile,
            _j: &JobPosting,
        ) -> Result<f64, AdjustmentError> {
            Ok(self.1)
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn ctx(algorithm: Algorithm) -> MatchContext {
        MatchContext::default().with_algorithm(algorithm).at(as_of())
    }

    const ALL: [Algorithm; 5] = [
        Algorithm::Comprehensive,
        Algorithm::Weighted,
        Algorithm::MlEnhanced,
        Algorithm::Collaborative,
        Algorithm::ContentBased,
    ];

    #[tokio::test]
    async fn test_partial_skills_scenario() {
        let engine = ScoringEngine::new(Arc::new(HeuristicAdjuster));
        let c = candidate(&["js", "react"]);
        let j = posting(&["js", "react", "node"]);
        let result = engine.score(&c, &j, &ctx(Algorithm::Comprehensive)).await;

        // 70 * 2/3 + 20 * 2/3
        assert!((result.skills_match - 60.0).abs() < 1e-9);
        assert!(result.overall_score < 100.0);
        assert_eq!(result.algorithm, Algorithm::Comprehensive);
    }

    #[tokio::test]
    async fn test_comprehensive_is_deterministic() {
        let engine = ScoringEngine::new(Arc::new(HeuristicAdjuster));
        let c = candidate(&["rust", "sql"]);
        let j = posting(&["rust", "kafka"]);
        let first = engine.score(&c, &j, &ctx(Algorithm::Comprehensive)).await;
        for _ in 0..5 {
            assert_eq!(engine.score(&c, &j, &ctx(Algorithm::Comprehensive)).await, first);
        }
    }

    #[tokio::test]
    async fn test_overall_bounded_for_every_algorithm() {
        let engine = ScoringEngine::new(Arc::new(FixedAdjuster(
            MlAdjustment {
                skills_multiplier: 1.5,
                experience_multiplier: 1.5,
                location_multiplier: 1.5,
                education_multiplier: 1.5,
                success_probability: 1.0,
            },
            100.0,
        )));
        let mut c = candidate(&["react", "typescript"]);
        c.education[0].degree = "PhD".to_string();
        let mut j = posting(&["react", "typescript"]);
        j.successful_applicant_skills = vec!["react".to_string()];

        let mut heavy = ctx(Algorithm::Weighted);
        heavy.weights = ScoringWeights {
            skills: 5.0,
            experience: 5.0,
            location: 5.0,
            education: 5.0,
            availability: 5.0,
            recent_activity: 5.0,
        };
        heavy.employer_preferences = Some(EmployerPreferences {
            preferred_skills: vec!["react".to_string()],
            boost: 50.0,
        });

        for algorithm in ALL {
            let mut context = heavy.clone();
            context.algorithm = algorithm;
            let result = engine.score(&c, &j, &context).await;
            assert!(
                (0.0..=100.0).contains(&result.overall_score),
                "{algorithm:?} gave {}",
                result.overall_score
            );
        }

        let empty = candidate(&[]);
        let mut stale = empty.clone();
        stale.is_active = false;
        stale.last_login_at = None;
        stale.updated_at = as_of() - chrono::Duration::days(3650);
        for algorithm in ALL {
            let result = engine.score(&stale, &j, &ctx(algorithm)).await;
            assert!((0.0..=100.0).contains(&result.overall_score));
        }
    }

    #[tokio::test]
    async fn test_ml_failure_degrades_to_comprehensive() {
        let engine = ScoringEngine::new(Arc::new(FailingAdjuster));
        let c = candidate(&["react"]);
        let j = posting(&["react", "node"]);

        let baseline = comprehensive(&c, &j, &ctx(Algorithm::Comprehensive));
        let ml = engine.score(&c, &j, &ctx(Algorithm::MlEnhanced)).await;
        assert!(ml.degraded);
        assert_eq!(ml.overall_score, baseline.overall_score);
        assert_eq!(ml.algorithm, Algorithm::Comprehensive);

        let collab = engine.score(&c, &j, &ctx(Algorithm::Collaborative)).await;
        assert!(collab.degraded);
        assert_eq!(collab.overall_score, baseline.overall_score);
    }

    #[tokio::test]
    async fn test_collaborative_blends_score() {
        let engine = ScoringEngine::new(Arc::new(FixedAdjuster(
            MlAdjustment {
                skills_multiplier: 1.0,
                experience_multiplier: 1.0,
                location_multiplier: 1.0,
                education_multiplier: 1.0,
                success_probability: 0.5,
            },
            0.0,
        )));
        let c = candidate(&["react"]);
        let j = posting(&["react"]);
        let base = comprehensive(&c, &j, &ctx(Algorithm::Comprehensive));
        let collab = engine.score(&c, &j, &ctx(Algorithm::Collaborative)).await;
        assert!(!collab.degraded);
        assert!((collab.overall_score - clamp_score(base.overall_score * 0.7)).abs() < 0.011);
    }

    #[tokio::test]
    async fn test_ml_neutral_adjustment_blends_probability() {
        let engine = ScoringEngine::new(Arc::new(FixedAdjuster(
            MlAdjustment {
                skills_multiplier: 1.0,
                experience_multiplier: 1.0,
                location_multiplier: 1.0,
                education_multiplier: 1.0,
                success_probability: 1.0,
            },
            0.0,
        )));
        let c = candidate(&["react"]);
        let j = posting(&["react"]);
        let base = comprehensive(&c, &j, &ctx(Algorithm::Comprehensive));
        let ml = engine.score(&c, &j, &ctx(Algorithm::MlEnhanced)).await;
        let expected = clamp_score(0.8 * base.overall_score + 20.0);
        assert!((ml.overall_score - expected).abs() < 0.011);
        assert_eq!(ml.algorithm, Algorithm::MlEnhanced);
    }

    #[test]
    fn test_weighted_employer_boost() {
        let c = candidate(&["react", "graphql"]);
        let j = posting(&["react"]);
        let plain = weighted(&c, &j, &ctx(Algorithm::Weighted));

        let mut boosted_ctx = ctx(Algorithm::Weighted);
        boosted_ctx.employer_preferences = Some(EmployerPreferences {
            preferred_skills: vec!["graphql".to_string(), "apollo".to_string()],
            boost: 10.0,
        });
        let boosted = weighted(&c, &j, &boosted_ctx);
        assert!((boosted.overall_score - (plain.overall_score + 5.0).min(100.0)).abs() < 0.011);
    }

    #[test]
    fn test_weighted_ignores_semantic_matches() {
        let c = candidate(&["react"]);
        let mut j = posting(&["react native"]);
        j.preferred_skills = vec!["react native".to_string()];
        assert_eq!(weighted(&c, &j, &ctx(Algorithm::Weighted)).skills_match, 0.0);
        assert!(comprehensive(&c, &j, &ctx(Algorithm::Comprehensive)).skills_match > 0.0);
    }

    #[test]
    fn test_content_based_rewards_text_alignment() {
        let c = candidate(&["react"]);
        let aligned = posting(&["react"]);
        let mut unrelated = posting(&["react"]);
        unrelated.title = "Platform Operator".to_string();
        unrelated.description = "Maintain billing ledgers. 3-5 years required.".to_string();

        let a = content_based(&c, &aligned, &ctx(Algorithm::ContentBased));
        let b = content_based(&c, &unrelated, &ctx(Algorithm::ContentBased));
        assert!(a.overall_score > b.overall_score);
        assert_eq!(a.algorithm, Algorithm::ContentBased);
    }

    #[test]
    fn test_clamp_score_handles_nan() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(-3.0), 0.0);
    }
}
