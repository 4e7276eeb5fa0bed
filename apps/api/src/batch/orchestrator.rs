//! Domain entry points for batch work. Each picks a default priority and executor name,
//! sizes `progress.total` when the input sets are explicit, and hands off to the scheduler.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::batch::executors::analytics::{self, AnalyticsExecutor, AnalyticsParams, ANALYTICS_STEPS};
use crate::batch::executors::cleanup::{self, CleanupExecutor, CleanupParams, CLEANUP_STEPS};
use crate::batch::executors::embeddings::{self, EmbeddingParams, EmbeddingsExecutor};
use crate::batch::executors::matching::{self, MatchingExecutor, MatchingParams};
use crate::batch::executors::recommendations::{
    self, RecommendationParams, RecommendationsExecutor,
};
use crate::batch::reports::ReportSink;
use crate::batch::store::TalentStore;
use crate::jobs::error::JobError;
use crate::jobs::scheduler::{CreateOptions, Scheduler};
use crate::matching::engine::ScoringEngine;
use crate::models::batch::{JobId, JobPriority, JobType};

/// Registers one executor per batch job kind.
pub async fn register_executors(
    scheduler: &Arc<Scheduler>,
    store: Arc<dyn TalentStore>,
    engine: ScoringEngine,
    sink: Arc<dyn ReportSink>,
    chunk_size: usize,
) {
    scheduler
        .register(Arc::new(MatchingExecutor::new(
            Arc::clone(&store),
            engine.clone(),
            chunk_size,
        )))
        .await;
    scheduler
        .register(Arc::new(RecommendationsExecutor::new(
            Arc::clone(&store),
            engine,
            chunk_size,
        )))
        .await;
    scheduler
        .register(Arc::new(EmbeddingsExecutor::new(Arc::clone(&store), chunk_size)))
        .await;
    scheduler
        .register(Arc::new(CleanupExecutor::new(scheduler, Arc::clone(&store))))
        .await;
    scheduler
        .register(Arc::new(AnalyticsExecutor::new(store, sink)))
        .await;
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    scheduler: Arc<Scheduler>,
}

impl BatchOrchestrator {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    pub async fn process_large_scale_matching(
        &self,
        params: MatchingParams,
        options: CreateOptions,
    ) -> Result<JobId, JobError> {
        let expected = params.expected_total();
        self.submit(
            JobType::Matching,
            matching::NAME,
            JobPriority::High,
            expected,
            &params,
            options,
        )
        .await
    }

    pub async fn process_batch_recommendations(
        &self,
        params: RecommendationParams,
        options: CreateOptions,
    ) -> Result<JobId, JobError> {
        let expected = params.expected_total();
        self.submit(
            JobType::Recommendations,
            recommendations::NAME,
            JobPriority::Medium,
            expected,
            &params,
            options,
        )
        .await
    }

    pub async fn process_embedding_updates(
        &self,
        params: EmbeddingParams,
        options: CreateOptions,
    ) -> Result<JobId, JobError> {
        let expected = params.expected_total();
        self.submit(
            JobType::Embeddings,
            embeddings::NAME,
            JobPriority::Low,
            expected,
            &params,
            options,
        )
        .await
    }

    pub async fn process_data_cleanup(
        &self,
        params: CleanupParams,
        options: CreateOptions,
    ) -> Result<JobId, JobError> {
        self.submit(
            JobType::Cleanup,
            cleanup::NAME,
            JobPriority::Low,
            Some(CLEANUP_STEPS),
            &params,
            options,
        )
        .await
    }

    pub async fn process_analytics_generation(
        &self,
        params: AnalyticsParams,
        options: CreateOptions,
    ) -> Result<JobId, JobError> {
        self.submit(
            JobType::Analytics,
            analytics::NAME,
            JobPriority::Medium,
            Some(ANALYTICS_STEPS),
            &params,
            options,
        )
        .await
    }

    /// Caller-supplied priority and total win over the defaults for the job kind.
    async fn submit<P: Serialize>(
        &self,
        job_type: JobType,
        name: &str,
        priority: JobPriority,
        expected_total: Option<u64>,
        params: &P,
        mut options: CreateOptions,
    ) -> Result<JobId, JobError> {
        let parameters = serde_json::to_value(params)?;
        options.priority = options.priority.or(Some(priority));
        options.expected_total = options.expected_total.or(expected_total);

        let job_id = self
            .scheduler
            .create(job_type, name, parameters, options)
            .await?;
        info!(%job_id, %job_type, name, "Batch job submitted");
        Ok(job_id)
    }
}
