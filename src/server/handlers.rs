use axum::{
    body::Bytes,
    extract::State,
    http::{header::COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::AppState;
use crate::agent::AgentMessage;
use crate::error::ApiError;

/// GET /__prefetch/health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.agent.cache().map(|c| c.name().to_string());
    Json(json!({
        "success": true,
        "data": {
            "status": if cache.is_some() { "ok" } else { "degraded" },
            "cache": cache,
            "upstream": state.upstream.as_str(),
            "timestamp": chrono::Utc::now(),
        }
    }))
}

/// POST /__prefetch/message - queue a message for the agent, no reply
pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let message: AgentMessage =
        serde_json::from_slice(&body).map_err(|e| ApiError::invalid_json(e.to_string()))?;

    let message = match message {
        AgentMessage::PrefetchAdminUrl { url } => {
            let resolved = state
                .upstream
                .join(&url)
                .map_err(|e| ApiError::bad_request(format!("Invalid URL {}: {}", url, e)))?;
            if resolved.origin() != state.upstream.origin() {
                return Err(ApiError::bad_request(format!("{} is not served by this agent", url)));
            }
            AgentMessage::prefetch(resolved.to_string())
        }
    };

    // Prefetches run with the caller's own cookies
    let credentials = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.messages.post_message(message, credentials);

    Ok((StatusCode::ACCEPTED, Json(json!({ "success": true }))))
}
