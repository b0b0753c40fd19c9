use std::path::PathBuf;

use crate::models::state::RecentJobRecord;
use crate::services::store::{self, StoreError};

/// Maximum number of audit records kept.
pub const RECENT_JOBS_CAPACITY: usize = 20;

/// Bounded, most-recent-first audit trail of terminal job outcomes.
#[derive(Debug, Default)]
pub struct RecentJobStore {
    path: Option<PathBuf>,
    records: Vec<RecentJobRecord>,
}

impl RecentJobStore {
    /// In-memory only.
    pub fn ephemeral() -> Self {
        Self::default()
    }

    /// Load persisted records. An unreadable file starts an empty trail.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut records: Vec<RecentJobRecord> = match store::read_json(&path) {
            Ok(records) => records.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable recent jobs file");
                Vec::new()
            }
        };
        records.truncate(RECENT_JOBS_CAPACITY);
        Self {
            path: Some(path),
            records,
        }
    }

    pub fn records(&self) -> &[RecentJobRecord] {
        &self.records
    }

    /// Prepend a record, evicting the oldest past capacity, then persist.
    ///
    /// The in-memory trail is updated even when persisting fails.
    pub fn push(&mut self, record: RecentJobRecord) -> Result<(), StoreError> {
        self.records.insert(0, record);
        self.records.truncate(RECENT_JOBS_CAPACITY);
        match &self.path {
            Some(path) => store::write_json(path, &self.records),
            None => Ok(()),
        }
    }
}
