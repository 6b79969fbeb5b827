//! Session-scoped sync service used by every client.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::adapters::{BudgetSync, ChecklistSync, GlobalSync, TripSync};
use crate::error::{Error, Result};
use crate::identity::{DeviceIdStore, DeviceIdentity};
use crate::models::{
    Change, Conflict, ConflictId, DataType, DeviceId, DeviceInfo, EntityId, Operation, Resolution,
    SyncMetadata,
};
use crate::sync::{
    run_rollbacks, ConflictStore, RegisterDeviceRequest, SharedState, StatusReport, SyncEngine,
    SyncOutcome, SyncSession, SyncState, SyncTransport,
};
use crate::util::normalize_text_option;

/// One signed-in sync session.
///
/// Created at login with [`SyncService::start`] and torn down with
/// [`SyncService::shutdown`]. Clones share all state, so a clone held by a
/// callback keeps working after the caller that started a sync is gone.
pub struct SyncService<T: SyncTransport> {
    transport: Arc<T>,
    session: Arc<SyncSession>,
    device_info: DeviceInfo,
    state: SharedState,
    engine: SyncEngine<T>,
    conflicts: ConflictStore<T>,
}

impl<T: SyncTransport> Clone for SyncService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            session: Arc::clone(&self.session),
            device_info: self.device_info.clone(),
            state: Arc::clone(&self.state),
            engine: self.engine.clone(),
            conflicts: self.conflicts.clone(),
        }
    }
}

impl<T: SyncTransport> SyncService<T> {
    /// Resolve the device identity and open a session for `user_id`.
    ///
    /// Fails with [`Error::SyncUnavailable`] when no device id can be
    /// obtained.
    pub async fn start<S: DeviceIdStore>(
        transport: T,
        store: S,
        user_id: impl Into<String>,
    ) -> Result<Self> {
        let user_id = normalize_text_option(Some(user_id.into()))
            .ok_or_else(|| Error::InvalidInput("user id must not be empty".to_string()))?;

        let mut identity = DeviceIdentity::new(store);
        let device_id = identity.get_or_create(&transport).await?.ok_or_else(|| {
            Error::SyncUnavailable("no device id could be obtained from the server".to_string())
        })?;

        tracing::info!("Sync session started for device {}", device_id);
        Ok(Self::from_parts(transport, SyncSession { user_id, device_id }))
    }

    /// Open a session for an already known device id
    pub fn from_parts(transport: T, session: SyncSession) -> Self {
        let transport = Arc::new(transport);
        let session = Arc::new(session);
        let state: SharedState = Arc::new(Mutex::new(SyncState::default()));
        Self {
            engine: SyncEngine::new(
                Arc::clone(&transport),
                Arc::clone(&session),
                Arc::clone(&state),
            ),
            conflicts: ConflictStore::new(
                Arc::clone(&transport),
                Arc::clone(&session),
                Arc::clone(&state),
            ),
            transport,
            session,
            device_info: DeviceInfo::current(None),
            state,
        }
    }

    /// Override the installation description sent on registration
    #[must_use]
    pub fn with_device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = device_info;
        self
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.session.device_id
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    pub const fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Register this device for `data_type` on the server
    pub async fn register(&self, data_type: DataType) -> Result<()> {
        let request = RegisterDeviceRequest {
            user_id: self.session.user_id.clone(),
            device_id: self.session.device_id.clone(),
            device_info: self.device_info.clone(),
            data_type,
        };
        if let Err(error) = self.transport.register_device(&request).await {
            tracing::warn!("Failed to register device for {}: {}", data_type, error);
            return Err(error.into());
        }
        tracing::info!(
            "Registered device {} for {}",
            self.session.device_id,
            data_type
        );
        Ok(())
    }

    /// Queue a local change for the next sync
    pub async fn add_change(
        &self,
        data_type: DataType,
        id: impl Into<EntityId>,
        operation: Operation,
        data: Value,
    ) -> Change {
        self.state
            .lock()
            .await
            .log
            .append(data_type, id, operation, data)
    }

    /// Apply a local mutation and queue it together with its undo step.
    ///
    /// `apply` runs under the session lock, so no sync can observe the
    /// mutation without its queued change. If `apply` fails nothing is
    /// queued. `rollback` runs if the change is later abandoned: the user
    /// keeps the remote side of its conflict, or clears it from the queue.
    pub async fn apply_optimistic<A, R>(
        &self,
        data_type: DataType,
        id: impl Into<EntityId>,
        operation: Operation,
        data: Value,
        apply: A,
        rollback: R,
    ) -> Result<Change>
    where
        A: FnOnce() -> Result<()>,
        R: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock().await;
        apply()?;
        let change = state.log.append(data_type, id, operation, data);
        state.ledger.record(&change, Box::new(rollback));
        Ok(change)
    }

    /// Run one sync cycle for `data_type`
    pub async fn sync(
        &self,
        data_type: DataType,
        changes: Option<Vec<Change>>,
    ) -> Result<SyncOutcome> {
        self.engine.sync(data_type, changes).await
    }

    /// Reload open conflicts from the server
    pub async fn fetch_conflicts(&self) -> Result<Vec<Conflict>> {
        self.conflicts.fetch().await
    }

    /// Submit a resolution; `Ok(false)` means the conflict is still open
    pub async fn resolve(&self, conflict_id: &ConflictId, resolution: &Resolution) -> Result<bool> {
        self.conflicts.resolve(conflict_id, resolution).await
    }

    /// Drop a conflict locally without telling the server
    pub async fn dismiss(&self, conflict_id: &ConflictId) -> bool {
        self.conflicts.dismiss(conflict_id).await
    }

    pub async fn conflicts(&self) -> Vec<Conflict> {
        self.conflicts.list().await
    }

    pub async fn conflicts_for(&self, data_type: DataType) -> Vec<Conflict> {
        self.conflicts.for_data_type(data_type).await
    }

    pub const fn conflict_store(&self) -> &ConflictStore<T> {
        &self.conflicts
    }

    /// Server-side bookkeeping for this device
    pub async fn remote_status(&self) -> Result<Vec<SyncMetadata>> {
        Ok(self
            .transport
            .fetch_status(&self.session.user_id, &self.session.device_id)
            .await?)
    }

    /// Status of one data type, or of the whole session when `scope` is `None`
    pub async fn status(&self, scope: Option<DataType>) -> StatusReport {
        let state = self.state.lock().await;
        match scope {
            Some(data_type) => StatusReport::for_scope(&state, data_type),
            None => StatusReport::for_session(&state),
        }
    }

    /// Queued changes, optionally for one data type
    pub async fn pending_changes(&self, data_type: Option<DataType>) -> Vec<Change> {
        let state = self.state.lock().await;
        match data_type {
            Some(data_type) => state.log.drain(data_type),
            None => state.log.entries().to_vec(),
        }
    }

    /// Abandon queued changes, rolling back any optimistic mutations
    pub async fn clear_pending(&self, data_type: Option<DataType>) -> Vec<Change> {
        let (removed, rollbacks) = {
            let mut state = self.state.lock().await;
            let removed = state.log.clear(data_type);
            let rollbacks = state.ledger.take(&removed);
            (removed, rollbacks)
        };
        run_rollbacks(rollbacks);
        if !removed.is_empty() {
            tracing::info!("Discarded {} pending change(s)", removed.len());
        }
        removed
    }

    pub fn trips(&self) -> TripSync<T> {
        TripSync::new(self.clone())
    }

    pub fn checklists(&self) -> ChecklistSync<T> {
        ChecklistSync::new(self.clone())
    }

    pub fn budgets(&self) -> BudgetSync<T> {
        BudgetSync::new(self.clone())
    }

    pub fn global(&self) -> GlobalSync<T> {
        GlobalSync::new(self.clone())
    }

    /// End the session, discarding anything still queued
    pub async fn shutdown(self) {
        let pending = self.state.lock().await.log.len();
        if pending > 0 {
            tracing::warn!(
                "Ending sync session with {} unsynced change(s); they will be discarded",
                pending
            );
        }
        tracing::info!("Sync session ended for device {}", self.session.device_id);
    }
}
