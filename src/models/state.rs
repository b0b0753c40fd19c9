use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::{Job, JobId};

/// Terminal local outcome recorded in the audit trail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecentStatus {
    Completed,
    Failed,
}

/// One entry of the bounded recent-jobs audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentJobRecord {
    pub id: JobId,
    pub tracking_code: String,
    pub order_number: String,
    pub status: RecentStatus,
    pub timestamp: DateTime<Utc>,
}

impl RecentJobRecord {
    pub fn new(job: &Job, status: RecentStatus) -> Self {
        Self {
            id: job.id.clone(),
            tracking_code: job.tracking_code.clone().unwrap_or_default(),
            order_number: job.order_number.clone().unwrap_or_default(),
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot published to observers after every state change.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub connected: bool,
    pub polling: bool,
    pub last_check: Option<DateTime<Utc>>,
    /// Jobs from the current list not yet attempted.
    pub queue_size: usize,
    pub error: Option<String>,
    pub recent_jobs: Vec<RecentJobRecord>,
}
