//! Axum route handlers for batch entry points.
//!
//! Each body is `{"parameters": {...}, "options": {...}}`; both halves are optional.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::batch::executors::analytics::AnalyticsParams;
use crate::batch::executors::cleanup::CleanupParams;
use crate::batch::executors::embeddings::EmbeddingParams;
use crate::batch::executors::matching::MatchingParams;
use crate::batch::executors::recommendations::RecommendationParams;
use crate::errors::AppError;
use crate::jobs::handlers::JobCreatedResponse;
use crate::jobs::scheduler::CreateOptions;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchRequest<P> {
    #[serde(default)]
    pub parameters: P,
    #[serde(default)]
    pub options: CreateOptions,
}

type Created = (StatusCode, Json<JobCreatedResponse>);

fn created(job_id: uuid::Uuid) -> Created {
    (StatusCode::CREATED, Json(JobCreatedResponse { job_id }))
}

/// POST /api/v1/batch/matching
pub async fn handle_matching(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest<MatchingParams>>,
) -> Result<Created, AppError> {
    let job_id = state
        .orchestrator
        .process_large_scale_matching(request.parameters, request.options)
        .await?;
    Ok(created(job_id))
}

/// POST /api/v1/batch/recommendations
pub async fn handle_recommendations(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest<RecommendationParams>>,
) -> Result<Created, AppError> {
    let job_id = state
        .orchestrator
        .process_batch_recommendations(request.parameters, request.options)
        .await?;
    Ok(created(job_id))
}

/// POST /api/v1/batch/embeddings
pub async fn handle_embeddings(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest<EmbeddingParams>>,
) -> Result<Created, AppError> {
    let job_id = state
        .orchestrator
        .process_embedding_updates(request.parameters, request.options)
        .await?;
    Ok(created(job_id))
}

/// POST /api/v1/batch/cleanup
pub async fn handle_cleanup(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest<CleanupParams>>,
) -> Result<Created, AppError> {
    let job_id = state
        .orchestrator
        .process_data_cleanup(request.parameters, request.options)
        .await?;
    Ok(created(job_id))
}

/// POST /api/v1/batch/analytics
pub async fn handle_analytics(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest<AnalyticsParams>>,
) -> Result<Created, AppError> {
    let job_id = state
        .orchestrator
        .process_analytics_generation(request.parameters, request.options)
        .await?;
    Ok(created(job_id))
}
