//! Per-conversation endpoints.
//!
//! `POST /api/conversations/{id}/messages` persists the new messages first and
//! only then compacts, so a failed summary never loses a turn.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use memoria_compaction::{AppendOutcome, RecordOutcome};
use memoria_core::Message;

use super::auth::require_auth;
use super::{api_error, ApiResult};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct AppendRequest {
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
pub struct ConversationView {
    pub conversation_id: String,
    pub version: i64,
    pub updated_at: String,
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
pub struct AppendReply {
    pub conversation_id: String,
    #[serde(flatten)]
    pub outcome: AppendOutcome,
}

#[derive(Serialize)]
pub struct CompactReply {
    pub conversation_id: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

#[derive(Serialize)]
pub struct DeleteReply {
    pub conversation_id: String,
    pub deleted: bool,
}

/// GET /api/conversations/{id}
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationView>> {
    require_auth(&state, &headers)?;

    let record = state
        .compaction
        .store()
        .get_record(&id)
        .map_err(|e| {
            warn!(conversation = %id, error = %e, "GET conversation failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("conversation '{id}' not found")))?;

    let messages = record.messages().map_err(|e| {
        warn!(conversation = %id, error = %e, "stored conversation does not decode");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(ConversationView {
        conversation_id: record.conversation_id,
        version: record.version,
        updated_at: record.updated_at,
        messages,
    }))
}

/// POST /api/conversations/{id}/messages
pub async fn append_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<AppendRequest>,
) -> ApiResult<Json<AppendReply>> {
    require_auth(&state, &headers)?;

    if req.messages.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "messages cannot be empty",
        ));
    }

    match state.compaction.append(&id, req.messages).await {
        Ok(outcome) => Ok(Json(AppendReply {
            conversation_id: id,
            outcome,
        })),
        Err(e) => {
            warn!(conversation = %id, error = %e, "append failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// DELETE /api/conversations/{id}
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteReply>> {
    require_auth(&state, &headers)?;

    match state.compaction.clear(&id).await {
        Ok(deleted) => Ok(Json(DeleteReply {
            conversation_id: id,
            deleted,
        })),
        Err(e) => {
            warn!(conversation = %id, error = %e, "delete failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// POST /api/conversations/{id}/compact
pub async fn compact_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<CompactReply>> {
    require_auth(&state, &headers)?;

    match state.compaction.compact_conversation(&id).await {
        Ok(outcome) => Ok(Json(CompactReply {
            conversation_id: id,
            outcome,
        })),
        Err(e) => {
            warn!(conversation = %id, error = %e, "manual conversation compaction failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
