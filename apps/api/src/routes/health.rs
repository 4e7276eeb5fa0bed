use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

/// GET /health
/// Returns service version, database reachability and the scheduler's queue depth.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            warn!("Health check could not reach PostgreSQL: {e}");
            "unavailable"
        }
    };
    let stats = state.scheduler.get_stats().await;

    Json(json!({
        "status": if database == "ok" { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "service": "talent-match-api",
        "database": database,
        "scoring": state.engine.adjuster_name(),
        "model_service": state.config.model_service_url.is_some(),
        "jobs": {
            "waiting": stats.waiting,
            "running": stats.running,
        }
    }))
}
