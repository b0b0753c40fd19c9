//! Local status API: the observer and command surface of the agent.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod agent;
pub mod health;
pub mod metrics;
pub mod printers;
pub mod settings;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler error rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct RouteError {
    status: StatusCode,
    message: String,
}

impl RouteError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Build the status API. `/metrics` is mounted only when a recorder exists.
pub fn router(state: AppState, prometheus: Option<Arc<PrometheusHandle>>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/state", get(agent::get_state))
        .route("/api/poll-now", post(agent::poll_now))
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::save_settings),
        )
        .route("/api/printers", get(printers::list_printers))
        .route("/api/test-print", post(printers::test_print))
        .with_state(state);

    if let Some(handle) = prometheus {
        app = app.route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(handle),
        );
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
}
