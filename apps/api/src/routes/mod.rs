pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::batch::handlers as batch;
use crate::jobs::handlers as jobs;
use crate::matching::handlers as matching;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Scoring API
        .route("/api/v1/matches/score", post(matching::handle_score))
        .route("/api/v1/matches/job-fit", post(matching::handle_job_fit))
        // Jobs API
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/api/v1/jobs/stats", get(jobs::handle_job_stats))
        .route("/api/v1/jobs/:id", get(jobs::handle_get_job))
        .route("/api/v1/jobs/:id/cancel", post(jobs::handle_cancel_job))
        .route("/api/v1/jobs/:id/retry", post(jobs::handle_retry_job))
        // Batch API
        .route("/api/v1/batch/matching", post(batch::handle_matching))
        .route(
            "/api/v1/batch/recommendations",
            post(batch::handle_recommendations),
        )
        .route("/api/v1/batch/embeddings", post(batch::handle_embeddings))
        .route("/api/v1/batch/cleanup", post(batch::handle_cleanup))
        .route("/api/v1/batch/analytics", post(batch::handle_analytics))
        .with_state(state)
}
