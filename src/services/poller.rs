//! Poll cycle driver and the process-wide agent runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use garde::Validate;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{AgentConfig, ConfigError};
use crate::models::job::{non_empty, Job};
use crate::models::settings::{SettingsUpdate, SettingsView};
use crate::models::state::{PollState, RecentJobRecord};
use crate::services::credentials::TokenStore;
use crate::services::processor::{CycleContext, JobOutcome, JobProcessor};
use crate::services::recent_jobs::RecentJobStore;
use crate::services::settings_store::{SettingsError, SettingsStore};

/// Releases the single-flight flag when the cycle ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the published snapshot, the audit trail, the poll timer, and the
/// single-flight flag. The active cycle is the only writer; observers read
/// through [`AgentRuntime::subscribe`].
pub struct AgentRuntime {
    processor: JobProcessor,
    settings: SettingsStore,
    tokens: Arc<dyn TokenStore>,
    recent: Mutex<RecentJobStore>,
    state: watch::Sender<PollState>,
    in_flight: AtomicBool,
    timer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AgentRuntime {
    pub fn new(
        processor: JobProcessor,
        settings: SettingsStore,
        tokens: Arc<dyn TokenStore>,
        recent: RecentJobStore,
    ) -> Arc<Self> {
        let initial = PollState {
            recent_jobs: recent.records().to_vec(),
            ..PollState::default()
        };
        let (state, _) = watch::channel(initial);
        Arc::new(Self {
            processor,
            settings,
            tokens,
            recent: Mutex::new(recent),
            state,
            in_flight: AtomicBool::new(false),
            timer: tokio::sync::Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn has_token(&self) -> bool {
        !self.tokens.get_token().trim().is_empty()
    }

    pub fn settings_view(&self) -> SettingsView {
        let settings = self.settings.get();
        SettingsView {
            api_url: settings.api_url,
            printer_name: settings.printer_name,
            poll_interval: settings.poll_interval,
            has_token: self.has_token(),
        }
    }

    pub fn local_printer(&self) -> Option<String> {
        non_empty(Some(&self.settings.get().printer_name)).map(str::to_string)
    }

    /// Resolve connection details from current settings and token.
    pub fn resolve_config(&self) -> Result<AgentConfig, ConfigError> {
        AgentConfig::resolve(&self.settings.get().api_url, &self.tokens.get_token())
    }

    /// Record a config problem without touching the network.
    pub fn report_config_error(&self, error: &ConfigError) {
        self.state.send_modify(|s| {
            s.connected = false;
            s.error = Some(error.to_string());
        });
    }

    /// Manual trigger. Shares the timer's single-flight guard.
    pub async fn poll_now(&self) -> bool {
        self.poll_cycle().await
    }

    /// Run one cycle over the whole pending queue.
    ///
    /// Returns `false` without doing anything when a cycle is already running.
    pub async fn poll_cycle(&self) -> bool {
        let Some(_guard) = FlightGuard::try_acquire(&self.in_flight) else {
            tracing::debug!("Poll cycle already running, skipping");
            return false;
        };

        let config = match self.resolve_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Agent not configured");
                self.report_config_error(&e);
                return true;
            }
        };
        let local_printer = self.local_printer();

        self.state.send_modify(|s| s.polling = true);
        metrics::counter!("poll_cycles_total").increment(1);

        match self.processor.api().fetch_pending_jobs(&config).await {
            Ok(pending) => {
                let total = pending.jobs.len();
                self.state.send_modify(|s| {
                    s.connected = true;
                    s.error = None;
                    s.last_check = Some(Utc::now());
                    s.queue_size = total;
                });
                metrics::gauge!("print_queue_depth").set(total as f64);
                if total > 0 {
                    tracing::info!(queue_size = total, "Processing pending jobs");
                }

                let ctx = CycleContext {
                    config,
                    local_printer,
                    server: pending.settings,
                };
                for (index, job) in pending.jobs.iter().enumerate() {
                    let outcome = self.processor.process(job, &ctx).await;
                    let recent = self.record_outcome(job, &outcome);
                    let remaining = total - (index + 1);
                    self.state.send_modify(|s| {
                        s.queue_size = remaining;
                        if let Some(recent) = recent {
                            s.recent_jobs = recent;
                        }
                    });
                    metrics::gauge!("print_queue_depth").set(remaining as f64);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Poll failed");
                metrics::counter!("poll_errors_total").increment(1);
                self.state.send_modify(|s| {
                    s.connected = false;
                    s.error = Some(e.to_string());
                });
            }
        }

        self.state.send_modify(|s| s.polling = false);
        true
    }

    /// Append the audit record for a terminal outcome and return the new trail.
    fn record_outcome(&self, job: &Job, outcome: &JobOutcome) -> Option<Vec<RecentJobRecord>> {
        let status = outcome.audit_status()?;
        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = recent.push(RecentJobRecord::new(job, status)) {
            tracing::warn!(job_id = %job.id, error = %e, "Could not persist recent jobs");
        }
        Some(recent.records().to_vec())
    }

    /// (Re)start the periodic trigger. The previous timer is fully stopped
    /// before the new one is armed; a cycle already in flight keeps running.
    pub async fn start_polling(self: &Arc<Self>) {
        let mut timer = self.timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
            let _ = handle.await;
        }

        let period = Duration::from_secs(self.settings.get().poll_interval);
        let runtime = Arc::clone(self);
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let runtime = Arc::clone(&runtime);
                tokio::spawn(async move {
                    runtime.poll_cycle().await;
                });
            }
        }));
        tracing::info!(interval_secs = period.as_secs(), "Polling started");
    }

    pub async fn stop_polling(&self) {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
            let _ = handle.await;
            tracing::info!("Polling stopped");
        }
    }

    pub async fn is_polling_scheduled(&self) -> bool {
        self.timer.lock().await.is_some()
    }

    /// Validate and persist a settings change, then restart polling.
    pub async fn apply_settings(
        self: &Arc<Self>,
        update: SettingsUpdate,
    ) -> Result<SettingsView, SettingsError> {
        update.validate()?;

        // Settings are checked first and only persisted once the token is stored.
        let next = self.settings.stage(
            update.api_url.as_deref(),
            update.printer_name.as_deref(),
            update.poll_interval,
        )?;
        if let Some(token) = update.agent_token.as_deref() {
            self.tokens.set_token(token)?;
        }
        self.settings.commit(next)?;

        tracing::info!("Settings saved");
        self.start_polling().await;
        Ok(self.settings_view())
    }
}
