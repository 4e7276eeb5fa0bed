//! Axum route handlers for the Matching API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::matching::engine::ScoreBreakdown;
use crate::matching::job_fit::{score_job_fit, JobFitBreakdown};
use crate::matching::weights::MatchContext;
use crate::models::candidate::CandidateProfile;
use crate::models::posting::JobPosting;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub candidate: CandidateProfile,
    pub job: JobPosting,
    #[serde(default)]
    pub context: MatchContext,
}

impl MatchRequest {
    fn validate(&self) -> Result<(), AppError> {
        self.candidate.validate()?;
        self.job.validate()?;
        Ok(())
    }
}

/// POST /api/v1/matches/score
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<ScoreBreakdown>, AppError> {
    request.validate()?;
    let breakdown = state
        .engine
        .score(&request.candidate, &request.job, &request.context)
        .await;
    Ok(Json(breakdown))
}

/// POST /api/v1/matches/job-fit
pub async fn handle_job_fit(
    Json(request): Json<MatchRequest>,
) -> Result<Json<JobFitBreakdown>, AppError> {
    request.validate()?;
    Ok(Json(score_job_fit(
        &request.candidate,
        &request.job,
        &request.context,
    )))
}
