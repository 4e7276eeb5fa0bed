//! `data_cleanup`: retention sweep over finished jobs and stale derived data.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::batch::store::TalentStore;
use crate::jobs::error::JobError;
use crate::jobs::registry::{JobContext, JobExecutor};
use crate::jobs::scheduler::Scheduler;
use crate::models::batch::{JobResults, JobType};

pub const NAME: &str = "data_cleanup";

/// Steps: finished jobs, then derived talent data.
pub const CLEANUP_STEPS: u64 = 2;

fn default_retention_days() -> i64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupParams {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

pub struct CleanupExecutor {
    // Weak: the scheduler owns this executor through its registry.
    scheduler: Weak<Scheduler>,
    store: Arc<dyn TalentStore>,
}

impl CleanupExecutor {
    pub fn new(scheduler: &Arc<Scheduler>, store: Arc<dyn TalentStore>) -> Self {
        Self {
            scheduler: Arc::downgrade(scheduler),
            store,
        }
    }
}

#[async_trait]
impl JobExecutor for CleanupExecutor {
    fn job_type(&self) -> JobType {
        JobType::Cleanup
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn validate_parameters(&self, parameters: &Value) -> Result<(), JobError> {
        let params: CleanupParams = serde_json::from_value(parameters.clone())?;
        if params.retention_days < 1 {
            return Err(JobError::Validation(
                "retention_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResults, JobError> {
        let params: CleanupParams = ctx.parameters()?;
        let before = Utc::now() - Duration::days(params.retention_days);
        ctx.progress.set_total(CLEANUP_STEPS).await;

        let mut results = JobResults::default();

        let scheduler = self
            .scheduler
            .upgrade()
            .ok_or_else(|| JobError::handler("scheduler is shutting down"))?;
        let jobs = match scheduler.purge_finished(before).await {
            Ok(outcome) => {
                results.record_success(1);
                Some(outcome)
            }
            Err(e) => {
                results.record_failure("batch_jobs", e.to_string(), 1);
                None
            }
        };
        drop(scheduler);
        ctx.progress.advance(1).await;

        let derived = match self.store.purge_stale(before).await {
            Ok(counts) => {
                results.record_success(1);
                Some(counts)
            }
            Err(e) => {
                results.record_failure("derived_data", e.to_string(), 1);
                None
            }
        };
        ctx.progress.advance(1).await;

        info!(
            job_id = %ctx.job.id,
            retention_days = params.retention_days,
            jobs_in_memory = jobs.map(|o| o.in_memory),
            jobs_persisted = jobs.map(|o| o.persisted),
            "Cleanup finished"
        );
        results.output = Some(json!({
            "cutoff": before,
            "jobs_removed_in_memory": jobs.map(|o| o.in_memory),
            "jobs_removed_persisted": jobs.map(|o| o.persisted),
            "match_scores_removed": derived.map(|d| d.match_scores),
            "recommendations_removed": derived.map(|d| d.recommendations),
        }));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::store::memory::InMemoryTalentStore;
    use crate::batch::store::MatchScoreRecord;
    use crate::jobs::persistence::memory::InMemoryJobStore;
    use crate::jobs::scheduler::SchedulerConfig;
    use crate::matching::engine::comprehensive;
    use crate::matching::factors::fixtures::{candidate, posting};
    use crate::matching::weights::MatchContext;
    use crate::models::batch::BatchJob;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_purges_stale_scores_and_keeps_fresh_ones() {
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(InMemoryJobStore::default()),
        );
        let store = Arc::new(InMemoryTalentStore::default());
        let (c, j) = (candidate(&["rust"]), posting(&["rust"]));
        let breakdown = comprehensive(&c, &j, &MatchContext::default());
        let record = |age_days: i64| MatchScoreRecord {
            candidate_id: c.id,
            job_id: j.id,
            overall_score: breakdown.overall_score,
            breakdown: breakdown.clone(),
            batch_job_id: Uuid::new_v4(),
            scored_at: Utc::now() - Duration::days(age_days),
        };
        store
            .scores
            .lock()
            .unwrap()
            .extend([record(90), record(45), record(1)]);

        let exec = CleanupExecutor::new(&scheduler, store.clone());
        let job = BatchJob::new(JobType::Cleanup, NAME, json!({"retention_days": 30}));
        let results = exec
            .execute(JobContext::new(job, Arc::clone(&scheduler)))
            .await
            .unwrap();

        assert_eq!(results.successful, 2);
        assert_eq!(store.scores.lock().unwrap().len(), 1);
        assert_eq!(results.output.unwrap()["match_scores_removed"], 2);
    }

    #[tokio::test]
    async fn test_fails_when_scheduler_dropped() {
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(InMemoryJobStore::default()),
        );
        let exec = CleanupExecutor::new(&scheduler, Arc::new(InMemoryTalentStore::default()));
        let ctx = JobContext::new(
            BatchJob::new(JobType::Cleanup, NAME, json!({})),
            Arc::clone(&scheduler),
        );
        assert!(exec.execute(ctx).await.is_ok());

        drop(scheduler);
        let orphan = Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(InMemoryJobStore::default()),
        );
        let ctx = JobContext::new(BatchJob::new(JobType::Cleanup, NAME, json!({})), orphan);
        assert!(matches!(exec.execute(ctx).await, Err(JobError::Handler(_))));
    }

    #[test]
    fn test_retention_must_be_positive() {
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(InMemoryJobStore::default()),
        );
        let exec = CleanupExecutor::new(&scheduler, Arc::new(InMemoryTalentStore::default()));
        assert!(exec.validate_parameters(&json!({"retention_days": 0})).is_err());
        assert!(exec.validate_parameters(&json!({})).is_ok());
    }
}
