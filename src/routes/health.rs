use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connected: bool,
    pub polling: bool,
}

/// GET /health: liveness plus remote connectivity as last observed.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.runtime.snapshot();
    let status = if snapshot.connected { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connected: snapshot.connected,
        polling: snapshot.polling,
    })
}
