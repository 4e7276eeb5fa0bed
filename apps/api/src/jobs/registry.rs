//! Pluggable units of work and the context they run with.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::jobs::error::JobError;
use crate::jobs::scheduler::Scheduler;
use crate::models::batch::{BatchJob, JobId, JobResults, JobType};

/// A handler the scheduler dispatches jobs to, keyed by `(job_type(), name())`.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    fn job_type(&self) -> JobType;

    fn name(&self) -> &'static str;

    /// Rejects malformed parameters at creation time.
    fn validate_parameters(&self, _parameters: &Value) -> Result<(), JobError> {
        Ok(())
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResults, JobError>;
}

/// What a handler sees: a snapshot of its job plus a channel back to the scheduler.
pub struct JobContext {
    pub job: BatchJob,
    pub progress: ProgressReporter,
}

impl JobContext {
    pub fn new(job: BatchJob, scheduler: Arc<Scheduler>) -> Self {
        let progress = ProgressReporter {
            job_id: job.id,
            scheduler,
        };
        Self { job, progress }
    }

    /// Deserializes the job parameters into the handler's own request type.
    pub fn parameters<T: serde::de::DeserializeOwned>(&self) -> Result<T, JobError> {
        Ok(serde_json::from_value(self.job.parameters.clone())?)
    }
}

#[derive(Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    scheduler: Arc<Scheduler>,
}

impl ProgressReporter {
    pub async fn set_total(&self, total: u64) {
        self.scheduler
            .update_progress(self.job_id, |p| p.set_total(total))
            .await;
    }

    pub async fn advance(&self, units: u64) {
        self.scheduler
            .update_progress(self.job_id, |p| p.advance(units))
            .await;
    }

    /// Cooperative cancellation check.
    pub async fn is_cancelled(&self) -> bool {
        self.scheduler.is_cancelled(self.job_id).await
    }
}

#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<(JobType, String), Arc<dyn JobExecutor>>,
}

impl ExecutorRegistry {
    pub fn insert(&mut self, executor: Arc<dyn JobExecutor>) -> Option<Arc<dyn JobExecutor>> {
        let key = (executor.job_type(), executor.name().to_string());
        self.executors.insert(key, executor)
    }

    pub fn get(&self, job_type: JobType, name: &str) -> Option<Arc<dyn JobExecutor>> {
        self.executors.get(&(job_type, name.to_string())).cloned()
    }

    pub fn contains(&self, job_type: JobType, name: &str) -> bool {
        self.executors.contains_key(&(job_type, name.to_string()))
    }
}
