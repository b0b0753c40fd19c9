//! Per-job pipeline: claim, fetch, print, report.
//!
//! The remote service is the only authority on who owns a job. A job is
//! claimed by asking for `printing`; once that succeeds every later failure
//! must be reported back as `failed` (best effort), because the service
//! otherwise keeps the job in `printing`.

use std::sync::Arc;
use std::time::Instant;

use crate::config::AgentConfig;
use crate::models::job::{non_empty, Job, JobStatus, ServerSettings};
use crate::models::state::RecentStatus;
use crate::services::api_client::{ApiClientError, JobApi};
use crate::services::label::{LabelError, LabelSource};
use crate::services::notifier::Notifier;
use crate::services::printer::{LabelPrinter, PrintError};

/// Longest failure message sent to the service.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

pub const UNKNOWN_PRINT_ERROR: &str = "Unknown print error";

/// Inputs shared by every job of one poll cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub config: AgentConfig,
    /// Printer chosen on this machine; wins over job and server hints.
    pub local_printer: Option<String>,
    pub server: ServerSettings,
}

/// Terminal result of one job attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { printer: String },
    /// Claim refused as a benign race; nothing recorded or reported.
    AlreadyHandled,
    /// Claim failed for another reason; nothing to roll back.
    ClaimFailed { message: String },
    /// Failed after claiming. `reported` tells whether the `failed` report
    /// reached the service.
    Failed { message: String, reported: bool },
}

impl JobOutcome {
    /// Audit status for this outcome, if it is recorded at all.
    pub fn audit_status(&self) -> Option<RecentStatus> {
        match self {
            JobOutcome::Completed { .. } => Some(RecentStatus::Completed),
            JobOutcome::ClaimFailed { .. } | JobOutcome::Failed { .. } => {
                Some(RecentStatus::Failed)
            }
            JobOutcome::AlreadyHandled => None,
        }
    }
}

/// Post-claim failures.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("No label URL")]
    MissingLabelUrl,

    #[error("No printer configured")]
    NoPrinter,

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Print(#[from] PrintError),

    #[error(transparent)]
    Api(#[from] ApiClientError),
}

/// Runs jobs one at a time through the claim/print/report state machine.
pub struct JobProcessor {
    api: Arc<dyn JobApi>,
    labels: Arc<dyn LabelSource>,
    printer: Arc<dyn LabelPrinter>,
    notifier: Arc<dyn Notifier>,
}

impl JobProcessor {
    pub fn new(
        api: Arc<dyn JobApi>,
        labels: Arc<dyn LabelSource>,
        printer: Arc<dyn LabelPrinter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            labels,
            printer,
            notifier,
        }
    }

    pub fn api(&self) -> &Arc<dyn JobApi> {
        &self.api
    }

    pub async fn process(&self, job: &Job, ctx: &CycleContext) -> JobOutcome {
        let started = Instant::now();

        if let Err(e) = self
            .api
            .update_job_status(&ctx.config, &job.id, JobStatus::Printing, None)
            .await
        {
            if e.is_benign_claim_race() {
                tracing::debug!(job_id = %job.id, error = %e, "Job already handled elsewhere");
                metrics::counter!("print_jobs_already_handled_total").increment(1);
                return JobOutcome::AlreadyHandled;
            }
            tracing::error!(job_id = %job.id, error = %e, "Failed to claim job");
            metrics::counter!("print_jobs_failed_total").increment(1);
            return JobOutcome::ClaimFailed {
                message: e.to_string(),
            };
        }

        tracing::info!(job_id = %job.id, "Job claimed");

        let outcome = match self.run_claimed(job, ctx).await {
            Ok(printer) => {
                tracing::info!(job_id = %job.id, printer = %printer, "Job completed");
                metrics::counter!("print_jobs_completed_total").increment(1);

                let body = format!("{} sent to {}", job.display_name(), printer);
                if let Err(e) = self.notifier.notify("Label Printed", &body) {
                    tracing::debug!(job_id = %job.id, error = %e, "Notification failed");
                }
                JobOutcome::Completed { printer }
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Job failed");
                metrics::counter!("print_jobs_failed_total").increment(1);
                self.report_failure(job, ctx, &e.to_string()).await
            }
        };

        metrics::histogram!("print_job_duration_seconds").record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn run_claimed(&self, job: &Job, ctx: &CycleContext) -> Result<String, JobError> {
        let label_url = non_empty(job.label_url.as_deref()).ok_or(JobError::MissingLabelUrl)?;
        let printer = resolve_printer(
            ctx.local_printer.as_deref(),
            job.printer_name.as_deref(),
            ctx.server.default_printer_name.as_deref(),
        )
        .ok_or(JobError::NoPrinter)?;

        let artifact = self.labels.download_label(label_url).await?;
        let output = self.printer.print_label(&artifact, &printer, job.label_format).await?;
        if !output.is_empty() {
            tracing::debug!(job_id = %job.id, output = %output, "Print submitted");
        }

        self.api
            .update_job_status(&ctx.config, &job.id, JobStatus::Completed, None)
            .await?;
        Ok(printer)
    }

    /// Exactly one `failed` report per post-claim failure. A failing report
    /// is only logged; the job then stays `printing` on the service side.
    async fn report_failure(&self, job: &Job, ctx: &CycleContext, raw_message: &str) -> JobOutcome {
        let message = failure_message(raw_message);
        let reported = match self
            .api
            .update_job_status(&ctx.config, &job.id, JobStatus::Failed, Some(&message))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Could not report job failure");
                false
            }
        };
        JobOutcome::Failed { message, reported }
    }
}

/// Local preference, then the job's printer, then the server default.
pub fn resolve_printer(
    local: Option<&str>,
    job: Option<&str>,
    server_default: Option<&str>,
) -> Option<String> {
    non_empty(local)
        .or_else(|| non_empty(job))
        .or_else(|| non_empty(server_default))
        .map(str::to_string)
}

/// Trimmed, non-empty, at most 500 characters.
pub fn failure_message(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_PRINT_ERROR.to_string();
    }
    trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}
