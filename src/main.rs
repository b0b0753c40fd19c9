use std::path::PathBuf;
use std::sync::Arc;

use label_print_agent::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{
        api_client::HttpJobApi,
        credentials::{FileTokenStore, TokenCipher, TokenStore},
        label::HttpLabelFetcher,
        notifier::CommandNotifier,
        poller::AgentRuntime,
        printer::{LpPrinter, PrinterDirectory},
        processor::JobProcessor,
        recent_jobs::RecentJobStore,
        settings_store::SettingsStore,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Starting print agent");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("print_jobs_completed_total", "Jobs printed and reported completed");
    metrics::describe_counter!("print_jobs_failed_total", "Jobs that ended in a local failure");
    metrics::describe_counter!(
        "print_jobs_already_handled_total",
        "Claims refused because another agent already took the job"
    );
    metrics::describe_counter!("poll_cycles_total", "Poll cycles started");
    metrics::describe_counter!("poll_errors_total", "Poll cycles whose job list request failed");
    metrics::describe_gauge!("print_queue_depth", "Jobs in the current cycle not yet attempted");
    metrics::describe_histogram!(
        "print_job_duration_seconds",
        "Time from claim to terminal outcome"
    );

    let data_dir = PathBuf::from(&config.data_dir);
    std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");

    // Credential store
    let cipher = config
        .token_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .map(|key| TokenCipher::new(key).expect("Failed to initialize token encryption"));
    if cipher.is_none() {
        tracing::warn!("TOKEN_KEY not set, agent token is stored unencrypted");
    }
    let tokens = Arc::new(FileTokenStore::new(data_dir.join("agent_token"), cipher));
    if let Some(seed) = config.agent_token.as_deref() {
        if tokens.get_token().is_empty() && !seed.trim().is_empty() {
            tokens.set_token(seed).expect("Failed to store agent token");
            tracing::info!("Agent token seeded from environment");
        }
    }

    let settings = SettingsStore::load_or_seed(data_dir.join("settings.json"), &config)
        .expect("Failed to load agent settings");
    let recent = RecentJobStore::load(data_dir.join("recent_jobs.json"));

    let printer = Arc::new(LpPrinter::new(config.lp_command.clone()));
    let processor = JobProcessor::new(
        Arc::new(HttpJobApi::new()),
        Arc::new(HttpLabelFetcher::default()),
        printer.clone(),
        Arc::new(CommandNotifier::new(config.notify_command.clone())),
    );
    let runtime = AgentRuntime::new(processor, settings, tokens, recent);

    if runtime.has_token() {
        runtime.start_polling().await;
    } else if let Err(e) = runtime.resolve_config() {
        tracing::warn!(error = %e, "Polling not started until settings are saved");
        runtime.report_config_error(&e);
    }

    let state = AppState::new(
        runtime.clone(),
        PrinterDirectory::new(config.lpstat_command.clone()),
        printer,
        std::env::temp_dir(),
    );
    let app = routes::router(state, Some(prometheus_handle));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Status API listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
        .expect("Server error");

    runtime.stop_polling().await;
}
