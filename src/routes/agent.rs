use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::state::PollState;

#[derive(Serialize)]
pub struct PollNowResponse {
    /// False when a cycle was already in flight.
    pub started: bool,
}

/// GET /api/state: latest published snapshot.
pub async fn get_state(State(state): State<AppState>) -> Json<PollState> {
    Json(state.runtime.snapshot())
}

/// POST /api/poll-now: run a cycle unless one is already running.
pub async fn poll_now(State(state): State<AppState>) -> Json<PollNowResponse> {
    let started = state.runtime.poll_now().await;
    Json(PollNowResponse { started })
}
