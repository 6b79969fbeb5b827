//! Session state shared by the engine, the conflict store and the service

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::change_log::ChangeLog;
use super::conflicts::ConflictSet;
use super::optimistic::OptimisticLedger;
use crate::models::{DataType, DeviceId, SyncStatus};

/// Identity of the signed-in session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession {
    pub user_id: String,
    pub device_id: DeviceId,
}

/// Status and bookkeeping for one data type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScopeState {
    pub(crate) status: SyncStatus,
    pub(crate) last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub(crate) struct SyncState {
    pub(crate) log: ChangeLog,
    pub(crate) conflicts: ConflictSet,
    pub(crate) ledger: OptimisticLedger,
    scopes: HashMap<DataType, ScopeState>,
}

pub(crate) type SharedState = Arc<Mutex<SyncState>>;

impl SyncState {
    pub(crate) fn scope(&self, data_type: DataType) -> ScopeState {
        self.scopes.get(&data_type).copied().unwrap_or_default()
    }

    pub(crate) fn scope_mut(&mut self, data_type: DataType) -> &mut ScopeState {
        self.scopes.entry(data_type).or_default()
    }

    pub(crate) fn set_status(&mut self, data_type: DataType, status: SyncStatus) {
        self.scope_mut(data_type).status = status;
    }

    /// Status a finished cycle leaves behind: `conflict` while any conflict
    /// for the data type is still open, `idle` otherwise
    pub(crate) fn settled_status(&self, data_type: DataType) -> SyncStatus {
        if self.conflicts.count_for(data_type) > 0 {
            SyncStatus::Conflict
        } else {
            SyncStatus::Idle
        }
    }

    /// Turn a cycle that never finished into `error`
    pub(crate) fn abandon_cycle(&mut self, data_type: DataType) {
        let scope = self.scope_mut(data_type);
        if scope.status == SyncStatus::Syncing {
            scope.status = SyncStatus::Error;
        }
    }

    /// Stored status with the conflict-to-idle transition applied
    pub(crate) fn effective_status(&self, data_type: DataType) -> SyncStatus {
        match self.scope(data_type).status {
            SyncStatus::Conflict if self.conflicts.count_for(data_type) == 0 => SyncStatus::Idle,
            status => status,
        }
    }

    /// Every scope that has been touched this session
    pub(crate) fn scopes(&self) -> impl Iterator<Item = (DataType, ScopeState)> + '_ {
        self.scopes.iter().map(|(data_type, scope)| (*data_type, *scope))
    }
}
