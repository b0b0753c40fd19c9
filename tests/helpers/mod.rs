//! Test helpers: an in-process fake of the remote job service plus fake
//! local collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::watch;

use label_print_agent::models::job::LabelFormat;
use label_print_agent::models::settings::AgentSettings;
use label_print_agent::models::state::PollState;
use label_print_agent::services::api_client::HttpJobApi;
use label_print_agent::services::credentials::{TokenStore, TokenStoreError};
use label_print_agent::services::label::HttpLabelFetcher;
use label_print_agent::services::notifier::CommandNotifier;
use label_print_agent::services::poller::AgentRuntime;
use label_print_agent::services::printer::{LabelPrinter, PrintError};
use label_print_agent::services::processor::JobProcessor;
use label_print_agent::services::recent_jobs::RecentJobStore;
use label_print_agent::services::settings_store::SettingsStore;

pub const TOKEN: &str = "test-agent-token";

/// A PATCH received by the fake service.
#[derive(Debug, Clone)]
pub struct PatchCall {
    pub job_id: String,
    pub status: String,
    pub error_message: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct FakeState {
    pub jobs_body: Mutex<Value>,
    pub list_status: Mutex<Option<u16>>,
    pub list_delay: Mutex<Duration>,
    pub list_calls: AtomicUsize,
    pub list_authorization: Mutex<Option<String>>,
    pub patches: Mutex<Vec<PatchCall>>,
    /// (job id, requested status) -> (HTTP status, JSON body)
    pub patch_responses: Mutex<HashMap<(String, String), (u16, Value)>>,
    pub label_requests: AtomicUsize,
}

impl FakeState {
    pub fn set_jobs(&self, body: Value) {
        *self.jobs_body.lock().unwrap() = body;
    }

    pub fn fail_list(&self, status: u16) {
        *self.list_status.lock().unwrap() = Some(status);
    }

    pub fn delay_list(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn respond_to_patch(&self, job_id: &str, status: &str, code: u16, body: Value) {
        self.patch_responses
            .lock()
            .unwrap()
            .insert((job_id.to_string(), status.to_string()), (code, body));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn patches(&self) -> Vec<PatchCall> {
        self.patches.lock().unwrap().clone()
    }

    pub fn patch_statuses(&self, job_id: &str) -> Vec<String> {
        self.patches()
            .into_iter()
            .filter(|p| p.job_id == job_id)
            .map(|p| p.status)
            .collect()
    }
}

pub struct FakeService {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn list_jobs(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    *state.list_authorization.lock().unwrap() = authorization(&headers);

    let delay = *state.list_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let failure = *state.list_status.lock().unwrap();
    if let Some(code) = failure {
        let status = StatusCode::from_u16(code).unwrap();
        return (status, Json(serde_json::json!({"error": "Service unavailable"}))).into_response();
    }

    let body = state.jobs_body.lock().unwrap().clone();
    Json(body).into_response()
}

async fn update_job(
    State(state): State<Arc<FakeState>>,
    UrlPath(job_id): UrlPath<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let status = body["status"].as_str().unwrap_or_default().to_string();
    state.patches.lock().unwrap().push(PatchCall {
        job_id: job_id.clone(),
        status: status.clone(),
        error_message: body["errorMessage"].as_str().map(str::to_string),
        authorization: authorization(&headers),
    });

    let scripted = state.patch_responses.lock().unwrap().get(&(job_id, status.clone())).cloned();
    match scripted {
        Some((code, body)) => (StatusCode::from_u16(code).unwrap(), Json(body)).into_response(),
        None => Json(serde_json::json!({"ok": true, "status": status})).into_response(),
    }
}

async fn serve_label(
    State(state): State<Arc<FakeState>>,
    UrlPath(name): UrlPath<String>,
) -> Response {
    state.label_requests.fetch_add(1, Ordering::SeqCst);
    match name.as_str() {
        "missing.zpl" => (StatusCode::NOT_FOUND, "not found").into_response(),
        "slow.zpl" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            ([(header::CONTENT_TYPE, "application/zpl")], "^XA^XZ").into_response()
        }
        "document" => ([(header::CONTENT_TYPE, "application/pdf")], "%PDF-1.4").into_response(),
        "blob" => ([(header::CONTENT_TYPE, "application/octet-stream")], "???").into_response(),
        _ => ([(header::CONTENT_TYPE, "text/plain")], "^XA^FO50,50^FDHello^FS^XZ").into_response(),
    }
}

async fn plain_error() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream exploded").into_response()
}

async fn not_json() -> Response {
    ([(header::CONTENT_TYPE, "text/html")], "<html>ok</html>").into_response()
}

/// Start the fake remote service on an ephemeral port.
pub async fn spawn_fake_service() -> FakeService {
    let state = Arc::new(FakeState::default());
    state.set_jobs(serde_json::json!({"jobs": [], "settings": {}}));

    let app = Router::new()
        .route("/api/agent/jobs", get(list_jobs))
        .route("/api/agent/jobs/{id}", patch(update_job))
        .route("/labels/{name}", get(serve_label))
        .route("/broken/api/agent/jobs", get(plain_error))
        .route("/html/api/agent/jobs", get(not_json))
        .with_state(state.clone());

    let base_url = serve(app).await;
    FakeService { base_url, state }
}

/// Serve any router on 127.0.0.1 and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<String>,
    pub fail_writes: AtomicBool,
}

impl MemoryTokenStore {
    pub fn with(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(token.to_string()),
            fail_writes: AtomicBool::new(false),
        })
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self) -> String {
        self.token.lock().unwrap().clone()
    }

    fn set_token(&self, token: &str) -> Result<(), TokenStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TokenStoreError::EncryptFailed);
        }
        *self.token.lock().unwrap() = token.trim().to_string();
        Ok(())
    }
}

/// One submission seen by [`RecordingPrinter`].
#[derive(Debug, Clone)]
pub struct PrintedLabel {
    pub printer: String,
    pub format: LabelFormat,
    pub extension: Option<String>,
    pub contents: Vec<u8>,
    /// Queue size published while this job was being printed.
    pub queue_size_during_print: Option<usize>,
}

/// Records submissions and deletes the artifact like the real executor.
#[derive(Default)]
pub struct RecordingPrinter {
    pub fail_with: Mutex<Option<String>>,
    pub printed: Mutex<Vec<PrintedLabel>>,
    pub observer: Mutex<Option<watch::Receiver<PollState>>>,
    pub artifacts: Mutex<Vec<PathBuf>>,
}

impl RecordingPrinter {
    pub fn observe(&self, rx: watch::Receiver<PollState>) {
        *self.observer.lock().unwrap() = Some(rx);
    }

    pub fn printed(&self) -> Vec<PrintedLabel> {
        self.printed.lock().unwrap().clone()
    }
}

#[async_trait]
impl LabelPrinter for RecordingPrinter {
    async fn print_label(
        &self,
        artifact: &Path,
        printer_name: &str,
        format: LabelFormat,
    ) -> Result<String, PrintError> {
        let contents = std::fs::read(artifact).unwrap_or_default();
        let _ = std::fs::remove_file(artifact);
        self.artifacts.lock().unwrap().push(artifact.to_path_buf());

        if printer_name.trim().is_empty() {
            return Err(PrintError::NoPrinter);
        }

        let queue_size_during_print = self
            .observer
            .lock()
            .unwrap()
            .as_ref()
            .map(|rx| rx.borrow().queue_size);
        self.printed.lock().unwrap().push(PrintedLabel {
            printer: printer_name.to_string(),
            format,
            extension: artifact.extension().and_then(|e| e.to_str()).map(str::to_string),
            contents,
            queue_size_during_print,
        });

        match self.fail_with.lock().unwrap().clone() {
            Some(detail) => Err(PrintError::Failed {
                detail,
                exit_code: Some(1),
            }),
            None => Ok("request id is Fake-1 (1 file(s))".to_string()),
        }
    }
}

/// Runtime wired to the fake service, writing labels into `label_dir`.
pub struct TestAgent {
    pub runtime: Arc<AgentRuntime>,
    pub printer: Arc<RecordingPrinter>,
    pub tokens: Arc<MemoryTokenStore>,
    pub label_dir: tempfile::TempDir,
}

pub fn build_agent(base_url: &str, printer_name: &str, recent: RecentJobStore) -> TestAgent {
    build_agent_with_token(base_url, printer_name, TOKEN, recent)
}

pub fn build_agent_with_token(
    base_url: &str,
    printer_name: &str,
    token: &str,
    recent: RecentJobStore,
) -> TestAgent {
    let label_dir = tempfile::tempdir().unwrap();
    let printer = Arc::new(RecordingPrinter::default());
    let tokens = MemoryTokenStore::with(token);

    let processor = JobProcessor::new(
        Arc::new(HttpJobApi::with_timeout(Duration::from_secs(5))),
        Arc::new(HttpLabelFetcher::new(label_dir.path())),
        printer.clone(),
        Arc::new(CommandNotifier::new(None)),
    );
    let settings = SettingsStore::ephemeral(AgentSettings {
        api_url: base_url.to_string(),
        printer_name: printer_name.to_string(),
        poll_interval: 30,
    });
    let runtime = AgentRuntime::new(processor, settings, tokens.clone(), recent);
    printer.observe(runtime.subscribe());

    TestAgent {
        runtime,
        printer,
        tokens,
        label_dir,
    }
}

/// Files left in a directory.
pub fn leftover_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect()
}
