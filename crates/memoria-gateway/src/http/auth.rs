//! Bearer-token check shared by the `/api/*` handlers.
//!
//! With no `gateway.auth_token` configured every request is allowed.

use axum::http::{HeaderMap, StatusCode};

use super::{api_error, ApiResult};
use crate::app::AppState;

/// Reject the request unless it carries the configured bearer token.
pub fn require_auth(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if check_auth(state, headers) {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Unauthorized. Set 'Authorization: Bearer <your-token>' header.",
        ))
    }
}

/// Returns true if the request is authorised.
fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    match state.config.gateway.auth_token.as_deref() {
        None => true,
        Some(expected) => extract_bearer(headers)
            .map(|t| t == expected)
            .unwrap_or(false),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
