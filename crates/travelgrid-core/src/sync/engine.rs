//! Sync cycle orchestration for one data type at a time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use super::state::{SharedState, SyncSession};
use super::transport::{ConflictRef, PushRequest, PushResponse, SyncTransport};
use crate::error::Result;
use crate::models::{Change, Conflict, DataType, EntityId, Operation, SyncStatus};

/// Result of one sync cycle
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Nothing was pending; no request was made
    Idle,
    /// Every pushed change went through
    Synced { pushed: usize, pruned: usize },
    /// The server reported conflicts; implicated changes are held
    Conflicted {
        conflicts: Vec<Conflict>,
        pruned: usize,
    },
}

impl SyncOutcome {
    #[must_use]
    pub const fn has_conflicts(&self) -> bool {
        matches!(self, Self::Conflicted { .. })
    }
}

/// Runs push cycles against the shared session state.
///
/// Overlapping syncs for the same data type queue behind a per-type gate;
/// different data types proceed independently.
pub struct SyncEngine<T: SyncTransport> {
    transport: Arc<T>,
    session: Arc<SyncSession>,
    state: SharedState,
    gates: Arc<HashMap<DataType, Mutex<()>>>,
}

impl<T: SyncTransport> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            session: Arc::clone(&self.session),
            state: Arc::clone(&self.state),
            gates: Arc::clone(&self.gates),
        }
    }
}

impl<T: SyncTransport> SyncEngine<T> {
    pub(crate) fn new(transport: Arc<T>, session: Arc<SyncSession>, state: SharedState) -> Self {
        let gates = DataType::ALL
            .into_iter()
            .map(|data_type| (data_type, Mutex::new(())))
            .collect();
        Self {
            transport,
            session,
            state,
            gates: Arc::new(gates),
        }
    }

    /// Push pending changes for `data_type`.
    ///
    /// With `changes`, only those entries (filtered to `data_type`) are
    /// pushed; otherwise the current log snapshot is used. On transport
    /// failure the scope turns `error` and the log is left untouched.
    pub async fn sync(&self, data_type: DataType, changes: Option<Vec<Change>>) -> Result<SyncOutcome> {
        let _gate = match self.gates.get(&data_type) {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let (snapshot, last_sync) = {
            let mut state = self.state.lock().await;
            let snapshot: Vec<Change> = match changes {
                Some(changes) => changes
                    .into_iter()
                    .filter(|change| change.data_type == data_type)
                    .collect(),
                None => state.log.drain(data_type),
            };
            if snapshot.is_empty() {
                let settled = state.settled_status(data_type);
                state.set_status(data_type, settled);
                tracing::debug!("No pending {} changes to sync", data_type);
                return Ok(SyncOutcome::Idle);
            }
            state.set_status(data_type, SyncStatus::Syncing);
            (snapshot, state.scope(data_type).last_sync)
        };
        let guard = CycleGuard::new(Arc::clone(&self.state), data_type);

        let request = PushRequest {
            user_id: self.session.user_id.clone(),
            device_id: self.session.device_id.clone(),
            data_type,
            changes: snapshot.clone(),
            last_sync_timestamp: last_sync,
        };

        let response = match self.transport.push(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("Sync failed for {}: {}", data_type, error);
                self.state
                    .lock()
                    .await
                    .set_status(data_type, SyncStatus::Error);
                guard.disarm();
                return Err(error.into());
            }
        };

        let conflicts = self.hydrate_conflicts(data_type, &snapshot, &response).await;
        let outcome = self
            .apply_response(data_type, snapshot, &response, conflicts)
            .await;
        guard.disarm();
        Ok(outcome)
    }

    /// Turn the push response's conflict references into full records.
    ///
    /// Bare entity ids are looked up on the server; when that lookup fails
    /// a placeholder is built from the local change instead.
    async fn hydrate_conflicts(
        &self,
        data_type: DataType,
        snapshot: &[Change],
        response: &PushResponse,
    ) -> Vec<Conflict> {
        let mut records = Vec::new();
        let mut bare = Vec::new();
        for reference in &response.conflicts {
            match reference {
                ConflictRef::Record(conflict) => records.push(conflict.as_ref().clone()),
                ConflictRef::EntityId(id) => {
                    if !bare.contains(id) {
                        bare.push(id.clone());
                    }
                }
            }
        }
        bare.retain(|id| !records.iter().any(|record| &record.data_id == id));
        if bare.is_empty() {
            return records;
        }

        let fetched = match self.transport.fetch_conflicts(&self.session.user_id).await {
            Ok(conflicts) => conflicts,
            Err(error) => {
                tracing::warn!(
                    "Could not load details for {} conflict(s): {}",
                    bare.len(),
                    error
                );
                Vec::new()
            }
        };

        for id in bare {
            let mut matched: Vec<Conflict> = fetched
                .iter()
                .filter(|conflict| conflict.data_type == data_type && conflict.data_id == id)
                .cloned()
                .collect();
            if matched.is_empty() {
                let local = snapshot
                    .iter()
                    .rev()
                    .find(|change| change.id == id)
                    .cloned()
                    .unwrap_or_else(|| Change::new(data_type, id, Operation::Update, Value::Null));
                matched.push(Conflict::placeholder(&local, &self.session.device_id));
            }
            records.append(&mut matched);
        }
        records
    }

    async fn apply_response(
        &self,
        data_type: DataType,
        snapshot: Vec<Change>,
        response: &PushResponse,
        conflicts: Vec<Conflict>,
    ) -> SyncOutcome {
        let implicated: HashSet<&EntityId> =
            response.conflicts.iter().map(ConflictRef::data_id).collect();
        let accepted_ids: Option<HashSet<&EntityId>> = response
            .accepted_change_ids
            .as_ref()
            .map(|ids| ids.iter().collect());

        let mut held = Vec::new();
        let mut accepted = Vec::new();
        let mut unacknowledged = 0_usize;
        for change in snapshot {
            if implicated.contains(&change.id) {
                held.push(change);
            } else if accepted_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&change.id))
            {
                accepted.push(change);
            } else {
                unacknowledged += 1;
            }
        }
        if unacknowledged > 0 {
            tracing::warn!(
                "{} {} change(s) were neither accepted nor conflicting; keeping them queued",
                unacknowledged,
                data_type
            );
        }

        let pushed = held.len() + accepted.len() + unacknowledged;
        let mut state = self.state.lock().await;
        let pruned = state.log.prune(&accepted);
        state.ledger.confirm(&accepted);

        for conflict in &conflicts {
            let entity_held = held
                .iter()
                .filter(|change| change.id == conflict.data_id)
                .cloned()
                .collect();
            state.conflicts.upsert(conflict.clone(), entity_held);
        }

        let settled = state.settled_status(data_type);
        let scope = state.scope_mut(data_type);
        scope.last_sync = Some(Utc::now());
        scope.status = settled;
        if conflicts.is_empty() {
            tracing::info!(
                "Synced {} {} change(s){}",
                pruned,
                data_type,
                response
                    .processed_count()
                    .map(|count| format!(" ({count} processed by server)"))
                    .unwrap_or_default()
            );
            SyncOutcome::Synced { pushed, pruned }
        } else {
            tracing::info!(
                "Sync for {} reported {} conflict(s); {} change(s) held",
                data_type,
                conflicts.len(),
                held.len()
            );
            SyncOutcome::Conflicted { conflicts, pruned }
        }
    }
}

/// Marks the scope `error` when a cycle is dropped before it finishes
struct CycleGuard {
    state: SharedState,
    data_type: DataType,
    armed: bool,
}

impl CycleGuard {
    const fn new(state: SharedState, data_type: DataType) -> Self {
        Self {
            state,
            data_type,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let data_type = self.data_type;
        tracing::warn!("Sync for {} was dropped before it finished", data_type);
        if let Ok(mut state) = self.state.try_lock() {
            state.abandon_cycle(data_type);
        } else if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = Arc::clone(&self.state);
            handle.spawn(async move {
                state.lock().await.abandon_cycle(data_type);
            });
        }
    }
}
