//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;

/// `GET /healthz`: `{}` with 200 while healthy, 503 once a stuck invocation
/// has marked the process unhealthy.
pub async fn healthz_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let status = if state.health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({})))
}
