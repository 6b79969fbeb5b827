//! Read-only status derived from session state

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::SyncState;
use crate::models::{DataType, SyncStatus};
use crate::util::format_last_sync;

/// Snapshot of sync state for one data type, or for the whole session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// `None` for the session-wide view
    pub scope: Option<DataType>,
    pub status: SyncStatus,
    pub is_syncing: bool,
    pub conflict_count: usize,
    pub pending_count: usize,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

impl StatusReport {
    pub(crate) fn for_scope(state: &SyncState, data_type: DataType) -> Self {
        let status = state.effective_status(data_type);
        Self {
            scope: Some(data_type),
            status,
            is_syncing: status == SyncStatus::Syncing,
            conflict_count: state.conflicts.count_for(data_type),
            pending_count: state.log.pending_count(data_type),
            last_sync_timestamp: state.scope(data_type).last_sync,
        }
    }

    pub(crate) fn for_session(state: &SyncState) -> Self {
        let mut status = SyncStatus::Idle;
        let mut last_sync: Option<DateTime<Utc>> = None;
        for (data_type, scope) in state.scopes() {
            let scope_status = state.effective_status(data_type);
            if scope_status.precedence() > status.precedence() {
                status = scope_status;
            }
            last_sync = last_sync.max(scope.last_sync);
        }
        Self {
            scope: None,
            status,
            is_syncing: status == SyncStatus::Syncing,
            conflict_count: state.conflicts.count(),
            pending_count: state.log.len(),
            last_sync_timestamp: last_sync,
        }
    }

    /// Short human-readable status
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self.status {
            SyncStatus::Idle => "Synced",
            SyncStatus::Syncing => "Syncing...",
            SyncStatus::Conflict if self.conflict_count == 1 => "Conflict detected",
            SyncStatus::Conflict => "Conflicts detected",
            SyncStatus::Error => "Sync error",
        }
    }

    #[must_use]
    pub fn last_sync_label(&self, now: DateTime<Utc>) -> String {
        format_last_sync(self.last_sync_timestamp, now)
    }
}
