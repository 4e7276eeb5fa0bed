use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::jobs::error::JobError;
use crate::models::common::ValidationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job error: {0}")]
    Job(JobError),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<JobError> for AppError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::Validation(msg) => AppError::Validation(msg),
            JobError::NotFound(id) => AppError::NotFound(format!("job {id}")),
            other => AppError::Job(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Job(e) => {
                tracing::error!("Job error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "JOB_ERROR",
                    "A job scheduling error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_job_errors_map_to_status_codes() {
        let cases = [
            (JobError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (JobError::NotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (
                JobError::Timeout(Duration::from_secs(1)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_validation_error_keeps_field() {
        let err = AppError::from(ValidationError::new("salary", "min exceeds max"));
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("salary")));
    }
}
