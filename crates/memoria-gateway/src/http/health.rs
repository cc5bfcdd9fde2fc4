use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with store and compaction status.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let compression = state.compaction.config();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "conversations": state.compaction.store().count().ok(),
        "compaction": {
            "enabled": compression.enabled,
            "running": state.compaction.is_running(),
            "schedule": compression.schedule.to_string(),
        },
    }))
}
