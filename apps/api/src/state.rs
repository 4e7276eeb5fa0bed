use std::sync::Arc;

use sqlx::PgPool;

use crate::batch::BatchOrchestrator;
use crate::config::Config;
use crate::jobs::Scheduler;
use crate::matching::ScoringEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pool shared with the job and talent stores; kept here for the health check.
    pub db: PgPool,
    pub scheduler: Arc<Scheduler>,
    pub orchestrator: BatchOrchestrator,
    /// Scoring engine for synchronous match requests. The adjuster is chosen at startup.
    pub engine: ScoringEngine,
    pub config: Config,
}
