//! API route handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use shared::{BroadcastResponse, Event};

use crate::api::AppState;
use crate::relay::RelayStats;

type BridgeError = (StatusCode, Json<BroadcastResponse>);

fn bridge_error(status: StatusCode, message: impl Into<String>) -> BridgeError {
    (status, Json(BroadcastResponse::failed(message)))
}

/// Bridge at the root, for application tiers that proxy `/api/broadcast` here.
pub fn bridge_routes() -> Router<AppState> {
    Router::new().route("/broadcast", post(broadcast))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/broadcast", post(broadcast))
        .route("/stats", get(stats))
}

// --- Bridge ---

/// Forward a persisted chat event to socket subscribers.
///
/// Success means the relay accepted the event, not that anyone received it.
async fn broadcast(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, BridgeError> {
    if let Some(key) = state.config.bridge_api_key.as_deref() {
        let token = extract_bearer_from_headers(&headers)?;
        if token != key {
            return Err(bridge_error(
                StatusCode::UNAUTHORIZED,
                "invalid bridge api key",
            ));
        }
    }

    let Json(body) = body.map_err(|e| bridge_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    let event = Event::from_broadcast(body)
        .map_err(|e| bridge_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    state.relay.publish(&event).map_err(|e| {
        tracing::warn!(error = %e, channel = ?event.channel, "bridge forward failed");
        bridge_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(BroadcastResponse::ok()))
}

// --- Stats ---

async fn stats(State(state): State<AppState>) -> Result<Json<RelayStats>, (StatusCode, String)> {
    state
        .relay
        .stats()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn extract_bearer_from_headers(headers: &HeaderMap) -> Result<&str, BridgeError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| bridge_error(StatusCode::UNAUTHORIZED, "missing authorization"))
}
