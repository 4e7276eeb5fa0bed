//! Axum route handlers for the Jobs API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::scheduler::CreateOptions;
use crate::models::batch::{BatchJob, JobId, JobStatus, JobType, SchedulerStats};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub name: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
    #[serde(default)]
    pub options: CreateOptions,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Serialize)]
pub struct JobCreatedResponse {
    pub job_id: JobId,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobActionResponse {
    pub job_id: JobId,
    pub accepted: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobCreatedResponse>), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    let job_id = state
        .scheduler
        .create(
            request.job_type,
            &request.name,
            request.parameters,
            request.options,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(JobCreatedResponse { job_id })))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchJob>, AppError> {
    state
        .scheduler
        .get_job(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {id}")))
}

/// GET /api/v1/jobs?status=
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<BatchJob>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()?;
    Ok(Json(state.scheduler.list_jobs(status).await))
}

/// POST /api/v1/jobs/:id/cancel
///
/// `accepted = false` when the job is unknown or already finished.
pub async fn handle_cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<JobActionResponse> {
    let accepted = state.scheduler.cancel_job(id).await;
    Json(JobActionResponse {
        job_id: id,
        accepted,
    })
}

/// POST /api/v1/jobs/:id/retry
///
/// Only permanently failed jobs are accepted.
pub async fn handle_retry_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<JobActionResponse> {
    let accepted = state.scheduler.retry_job(id).await;
    Json(JobActionResponse {
        job_id: id,
        accepted,
    })
}

/// GET /api/v1/jobs/stats
pub async fn handle_job_stats(State(state): State<AppState>) -> Json<SchedulerStats> {
    Json(state.scheduler.get_stats().await)
}
