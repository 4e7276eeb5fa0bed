use std::time::Duration;

use thiserror::Error;

use crate::models::batch::JobId;
use crate::models::common::ValidationError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("job not found: {0}")]
    NotFound(JobId),
}

impl JobError {
    pub fn handler(message: impl Into<String>) -> Self {
        JobError::Handler(message.into())
    }
}

impl From<ValidationError> for JobError {
    fn from(e: ValidationError) -> Self {
        JobError::Validation(e.to_string())
    }
}

impl From<sqlx::Error> for JobError {
    fn from(e: sqlx::Error) -> Self {
        JobError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        JobError::Validation(e.to_string())
    }
}
