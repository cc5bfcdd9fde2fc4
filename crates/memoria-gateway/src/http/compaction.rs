//! Manual trigger for the batch compaction pass: POST /api/compression/trigger
//!
//! Response: `{"success": true, "message": "...", "duration_ms": 12, "report": {...}, "timestamp": "..."}`
//! Failure:  `{"success": false, "message": "...", "timestamp": "..."}` with 500,
//! or 409 when a pass is already running.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use memoria_compaction::{CompactionError, CompactionRunReport};

use super::auth::require_auth;
use super::ApiResult;
use crate::app::AppState;

#[derive(Serialize)]
pub struct TriggerReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CompactionRunReport>,
    pub timestamp: String,
}

impl TriggerReply {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            duration_ms: None,
            report: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Run one batch pass and wait for it.
pub async fn trigger_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<TriggerReply>)> {
    require_auth(&state, &headers)?;

    info!("manual compaction pass triggered");
    let clock = Instant::now();

    let reply = match state.compaction.run_pass().await {
        Ok(report) => {
            let message = if report.is_some() {
                "Compaction pass completed"
            } else {
                "Compaction is disabled, pass skipped"
            };
            (
                StatusCode::OK,
                TriggerReply {
                    success: true,
                    message: message.to_string(),
                    duration_ms: Some(clock.elapsed().as_millis() as u64),
                    report,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                },
            )
        }
        Err(CompactionError::AlreadyRunning) => {
            warn!("manual trigger rejected, a pass is already running");
            (
                StatusCode::CONFLICT,
                TriggerReply::failed("A compaction pass is already running".to_string()),
            )
        }
        Err(e) => {
            error!(error = %e, "manual compaction pass failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                TriggerReply::failed(format!("Compaction pass failed: {e}")),
            )
        }
    };

    Ok((reply.0, Json(reply.1)))
}
