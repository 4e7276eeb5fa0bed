mod batch;
mod config;
mod db;
mod errors;
mod jobs;
mod matching;
mod models;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::batch::{register_executors, BatchOrchestrator, PgTalentStore, S3ReportSink};
use crate::config::Config;
use crate::db::create_pool;
use crate::jobs::events::spawn_redis_forwarder;
use crate::jobs::persistence::PgJobStore;
use crate::jobs::Scheduler;
use crate::matching::model_service::ModelServiceAdjuster;
use crate::matching::{HeuristicAdjuster, ScoreAdjuster, ScoringEngine};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Talent Match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Scoring engine: external model service when configured, heuristics otherwise
    let adjuster: Arc<dyn ScoreAdjuster> = match &config.model_service_url {
        Some(url) => match ModelServiceAdjuster::new(url.clone()) {
            Ok(service) => Arc::new(service),
            Err(e) => {
                warn!("Model service client unavailable, using heuristics: {e}");
                Arc::new(HeuristicAdjuster)
            }
        },
        None => Arc::new(HeuristicAdjuster),
    };
    let engine = ScoringEngine::new(adjuster);
    info!("Scoring engine initialized (adjuster: {})", engine.adjuster_name());

    // Scheduler and batch executors
    let scheduler = Scheduler::new(
        config.scheduler_config(),
        Arc::new(PgJobStore::new(db.clone())),
    );
    register_executors(
        &scheduler,
        Arc::new(PgTalentStore::new(db.clone())),
        engine.clone(),
        Arc::new(S3ReportSink::new(s3, config.s3_bucket.clone())),
        config.batch_chunk_size,
    )
    .await;

    // Initialize Redis event forwarding
    let redis = redis::Client::open(config.redis_url.clone())?;
    let forwarder = spawn_redis_forwarder(redis, scheduler.subscribe());
    info!("Redis client initialized");

    let recovered = scheduler.recover().await?;
    info!("Recovered {recovered} unfinished jobs");
    scheduler.start().await;

    // Build app state
    let state = AppState {
        db,
        scheduler: Arc::clone(&scheduler),
        orchestrator: BatchOrchestrator::new(Arc::clone(&scheduler)),
        engine,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    forwarder.abort();
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "talent-match-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
