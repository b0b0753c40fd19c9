use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::settings::{SettingsUpdate, SettingsView};
use crate::routes::RouteError;
use crate::services::settings_store::SettingsError;

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsView> {
    Json(state.runtime.settings_view())
}

/// PUT /api/settings: persist changes and restart polling.
pub async fn save_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, RouteError> {
    match state.runtime.apply_settings(update).await {
        Ok(view) => Ok(Json(view)),
        Err(e @ (SettingsError::Validation(_) | SettingsError::Config(_))) => {
            Err(RouteError::new(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save settings");
            Err(RouteError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
