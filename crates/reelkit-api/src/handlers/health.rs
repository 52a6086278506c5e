//! Health endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::error::ApiResult;
use crate::state::AppState;

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe: the store answers and the queue is started.
pub async fn ready(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.store.query_one("SELECT 1", &[]).await?;
    let stats = state.queue.stats().await;
    Ok(Json(json!({ "status": "ok", "queue_started": stats.started })))
}
