use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::LabelFormat;
use crate::routes::RouteError;

const TEST_PAGE: &str = "Print Agent - Test Print\n\nIf you can read this, printing is working!\n";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintersResponse {
    pub printers: Vec<String>,
    pub default_printer: Option<String>,
}

#[derive(Serialize)]
pub struct TestPrintResponse {
    pub printer: String,
    pub output: String,
}

/// GET /api/printers: printers known to the local print system.
pub async fn list_printers(State(state): State<AppState>) -> Json<PrintersResponse> {
    let printers = state.printers.list_printers().await;
    let default_printer = state.printers.default_printer().await;
    Json(PrintersResponse {
        printers,
        default_printer,
    })
}

/// POST /api/test-print: send a plain text page to the configured printer.
pub async fn test_print(
    State(state): State<AppState>,
) -> Result<Json<TestPrintResponse>, RouteError> {
    let printer = state
        .runtime
        .local_printer()
        .ok_or_else(|| RouteError::new(StatusCode::BAD_REQUEST, "No printer selected"))?;

    let suffix = Uuid::new_v4().simple().to_string();
    let path = state.temp_dir.join(format!("print-agent-test-{}.txt", &suffix[..8]));
    tokio::fs::write(&path, TEST_PAGE).await.map_err(|e| {
        RouteError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to write test page: {e}"),
        )
    })?;

    match state.printer.print_label(&path, &printer, LabelFormat::Unknown).await {
        Ok(output) => {
            tracing::info!(printer = %printer, "Test page printed");
            Ok(Json(TestPrintResponse { printer, output }))
        }
        Err(e) => {
            tracing::warn!(printer = %printer, error = %e, "Test print failed");
            Err(RouteError::new(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}
