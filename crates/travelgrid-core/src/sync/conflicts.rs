//! Open conflicts and their resolution

use std::sync::Arc;

use super::optimistic::{run_rollbacks, RollbackHook};
use super::state::{SharedState, SyncSession};
use super::transport::SyncTransport;
use crate::error::{Error, Result};
use crate::models::{
    Change, Conflict, ConflictId, ConflictStatus, DataType, Resolution, ResolutionStrategy,
};

/// A conflict plus the local changes it keeps out of the prune path
#[derive(Debug, Clone)]
pub(crate) struct OpenConflict {
    pub(crate) conflict: Conflict,
    pub(crate) held: Vec<Change>,
}

/// Local cache of open conflicts
#[derive(Debug, Default)]
pub(crate) struct ConflictSet {
    open: Vec<OpenConflict>,
}

impl ConflictSet {
    /// Insert or replace a conflict by id, merging held changes.
    ///
    /// A real record absorbs any placeholder for the same entity.
    pub(crate) fn upsert(&mut self, conflict: Conflict, held: Vec<Change>) {
        let mut held = held;
        if !conflict.is_placeholder() {
            let mut index = 0;
            while index < self.open.len() {
                let existing = &self.open[index].conflict;
                if existing.is_placeholder()
                    && existing.data_type == conflict.data_type
                    && existing.data_id == conflict.data_id
                {
                    let absorbed = self.open.remove(index);
                    merge_held(&mut held, absorbed.held);
                } else {
                    index += 1;
                }
            }
        }

        if let Some(existing) = self
            .open
            .iter_mut()
            .find(|open| open.conflict.id == conflict.id)
        {
            existing.conflict = conflict;
            merge_held(&mut existing.held, held);
        } else {
            self.open.push(OpenConflict { conflict, held });
        }
    }

    /// Replace the set with the server's view, keeping held changes for
    /// conflicts that are still open.
    pub(crate) fn replace_all(&mut self, conflicts: Vec<Conflict>) {
        let previous = std::mem::take(&mut self.open);
        for conflict in conflicts
            .into_iter()
            .filter(|conflict| conflict.status == ConflictStatus::Pending)
        {
            let held = previous
                .iter()
                .filter(|open| {
                    open.conflict.id == conflict.id
                        || (open.conflict.is_placeholder()
                            && open.conflict.data_type == conflict.data_type
                            && open.conflict.data_id == conflict.data_id)
                })
                .flat_map(|open| open.held.iter().cloned())
                .collect();
            self.upsert(conflict, held);
        }
    }

    pub(crate) fn remove(&mut self, id: &ConflictId) -> Option<OpenConflict> {
        let index = self.open.iter().position(|open| &open.conflict.id == id)?;
        Some(self.open.remove(index))
    }

    pub(crate) fn get(&self, id: &ConflictId) -> Option<&OpenConflict> {
        self.open.iter().find(|open| &open.conflict.id == id)
    }

    pub(crate) fn list(&self) -> Vec<Conflict> {
        self.open.iter().map(|open| open.conflict.clone()).collect()
    }

    pub(crate) fn for_data_type(&self, data_type: DataType) -> Vec<Conflict> {
        self.open
            .iter()
            .filter(|open| open.conflict.data_type == data_type)
            .map(|open| open.conflict.clone())
            .collect()
    }

    pub(crate) fn count(&self) -> usize {
        self.open.len()
    }

    pub(crate) fn count_for(&self, data_type: DataType) -> usize {
        self.open
            .iter()
            .filter(|open| open.conflict.data_type == data_type)
            .count()
    }
}

fn merge_held(target: &mut Vec<Change>, incoming: Vec<Change>) {
    for change in incoming {
        if !target.iter().any(|held| held.same_entry(&change)) {
            target.push(change);
        }
    }
}

/// Handle over the session's open conflicts.
///
/// Cheap to clone; every clone sees the same conflicts.
pub struct ConflictStore<T: SyncTransport> {
    transport: Arc<T>,
    session: Arc<SyncSession>,
    state: SharedState,
}

impl<T: SyncTransport> Clone for ConflictStore<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            session: Arc::clone(&self.session),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: SyncTransport> ConflictStore<T> {
    pub(crate) const fn new(
        transport: Arc<T>,
        session: Arc<SyncSession>,
        state: SharedState,
    ) -> Self {
        Self {
            transport,
            session,
            state,
        }
    }

    /// Replace the local set with the server's open conflicts
    pub async fn fetch(&self) -> Result<Vec<Conflict>> {
        let conflicts = self
            .transport
            .fetch_conflicts(&self.session.user_id)
            .await?;
        let mut state = self.state.lock().await;
        state.conflicts.replace_all(conflicts);
        tracing::debug!("Loaded {} open conflict(s)", state.conflicts.count());
        Ok(state.conflicts.list())
    }

    /// Submit a resolution for one conflict.
    ///
    /// Returns `Ok(false)` when the server rejects or cannot be reached; the
    /// conflict then stays open. Malformed resolutions and unknown ids are
    /// errors and never reach the server.
    pub async fn resolve(&self, conflict_id: &ConflictId, resolution: &Resolution) -> Result<bool> {
        resolution.validate()?;
        {
            let state = self.state.lock().await;
            let open = state
                .conflicts
                .get(conflict_id)
                .ok_or_else(|| Error::NotFound(format!("conflict {conflict_id}")))?;
            if open.conflict.is_placeholder() {
                return Err(Error::InvalidInput(format!(
                    "conflict {conflict_id} has not been loaded from the server yet; fetch conflicts first"
                )));
            }
        }

        if let Err(error) = self
            .transport
            .resolve_conflict(conflict_id, resolution)
            .await
        {
            tracing::warn!("Failed to resolve conflict {}: {}", conflict_id, error);
            return Ok(false);
        }

        let rollbacks = self.settle(conflict_id, resolution.strategy).await;
        run_rollbacks(rollbacks);
        tracing::info!(
            "Resolved conflict {} with {}",
            conflict_id,
            resolution.strategy
        );
        Ok(true)
    }

    async fn settle(
        &self,
        conflict_id: &ConflictId,
        strategy: ResolutionStrategy,
    ) -> Vec<RollbackHook> {
        let mut state = self.state.lock().await;
        let Some(open) = state.conflicts.remove(conflict_id) else {
            return Vec::new();
        };
        state.log.prune(&open.held);
        if strategy == ResolutionStrategy::AcceptRemote {
            state.ledger.take(&open.held)
        } else {
            state.ledger.confirm(&open.held);
            Vec::new()
        }
    }

    /// Drop a conflict locally without contacting the server.
    ///
    /// Its held changes stay pending and go out with the next sync.
    pub async fn dismiss(&self, conflict_id: &ConflictId) -> bool {
        let removed = self.state.lock().await.conflicts.remove(conflict_id);
        if removed.is_some() {
            tracing::info!("Dismissed conflict {}", conflict_id);
        }
        removed.is_some()
    }

    pub async fn list(&self) -> Vec<Conflict> {
        self.state.lock().await.conflicts.list()
    }

    pub async fn for_data_type(&self, data_type: DataType) -> Vec<Conflict> {
        self.state.lock().await.conflicts.for_data_type(data_type)
    }

    pub async fn count(&self) -> usize {
        self.state.lock().await.conflicts.count()
    }

    pub async fn get(&self, conflict_id: &ConflictId) -> Option<Conflict> {
        self.state
            .lock()
            .await
            .conflicts
            .get(conflict_id)
            .map(|open| open.conflict.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceId, EntityId, Operation};
    use crate::sync::state::SyncState;
    use crate::sync::testing::{conflict_record, ScriptedTransport};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::Mutex;

    fn store_with(
        transport: &ScriptedTransport,
        state: SyncState,
    ) -> (ConflictStore<ScriptedTransport>, SharedState) {
        let state = Arc::new(Mutex::new(state));
        let session = Arc::new(SyncSession {
            user_id: "u1".to_string(),
            device_id: DeviceId::new("laptop"),
        });
        let store = ConflictStore::new(Arc::new(transport.clone()), session, Arc::clone(&state));
        (store, state)
    }

    #[test]
    fn upsert_replaces_equal_ids_and_absorbs_placeholders() {
        let change = Change::new(DataType::Trip, "t1", Operation::Update, json!({"v": 1}));
        let mut set = ConflictSet::default();
        set.upsert(
            Conflict::placeholder(&change, &DeviceId::new("laptop")),
            vec![change.clone()],
        );
        set.upsert(conflict_record("c1", DataType::Trip, "t1"), Vec::new());
        set.upsert(conflict_record("c1", DataType::Trip, "t1"), vec![change.clone()]);

        assert_eq!(set.count(), 1);
        let open = set.get(&ConflictId::new("c1")).unwrap();
        assert_eq!(open.held, vec![change]);
    }

    #[test]
    fn replace_all_keeps_held_changes_and_skips_settled_records() {
        let change = Change::new(DataType::Budget, "b1", Operation::Update, json!({}));
        let mut set = ConflictSet::default();
        set.upsert(conflict_record("c1", DataType::Budget, "b1"), vec![change.clone()]);
        set.upsert(conflict_record("c2", DataType::Trip, "t2"), Vec::new());

        let mut settled = conflict_record("c3", DataType::Trip, "t3");
        settled.status = ConflictStatus::Resolved;
        set.replace_all(vec![conflict_record("c1", DataType::Budget, "b1"), settled]);

        assert_eq!(set.count(), 1);
        assert_eq!(set.get(&ConflictId::new("c1")).unwrap().held, vec![change]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fetch_replaces_local_view() {
        let transport = ScriptedTransport::new();
        transport.set_conflicts(vec![
            conflict_record("c1", DataType::Trip, "t1"),
            conflict_record("c2", DataType::Checklist, "k1"),
        ]);
        let mut state = SyncState::default();
        state
            .conflicts
            .upsert(conflict_record("stale", DataType::Trip, "t9"), Vec::new());
        let (store, _) = store_with(&transport, state);

        let conflicts = store.fetch().await.unwrap();

        assert_eq!(conflicts.len(), 2);
        assert!(store.get(&ConflictId::new("stale")).await.is_none());
        assert_eq!(store.for_data_type(DataType::Checklist).await.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolve_success_removes_conflict_and_prunes_held_changes() {
        let transport = ScriptedTransport::new();
        let mut state = SyncState::default();
        let held = state
            .log
            .append(DataType::Trip, "t1", Operation::Update, json!({"v": 2}));
        state
            .conflicts
            .upsert(conflict_record("c1", DataType::Trip, "t1"), vec![held]);
        state
            .conflicts
            .upsert(conflict_record("c2", DataType::Trip, "t2"), Vec::new());
        let (store, shared) = store_with(&transport, state);

        let resolved = store
            .resolve(&ConflictId::new("c1"), &Resolution::accept_local())
            .await
            .unwrap();

        assert!(resolved);
        assert_eq!(store.count().await, 1);
        assert!(shared.lock().await.log.is_empty());
        assert_eq!(transport.resolutions()[0].0, ConflictId::new("c1"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolve_failure_keeps_conflict() {
        let transport = ScriptedTransport::new();
        transport.fail_next_resolve();
        let mut state = SyncState::default();
        state
            .conflicts
            .upsert(conflict_record("c1", DataType::Trip, "t1"), Vec::new());
        let (store, _) = store_with(&transport, state);

        let resolved = store
            .resolve(&ConflictId::new("c1"), &Resolution::merge())
            .await
            .unwrap();

        assert!(!resolved);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolve_rejects_bad_input_before_sending() {
        let transport = ScriptedTransport::new();
        let mut state = SyncState::default();
        let change = Change::new(DataType::Trip, "t5", Operation::Update, json!({}));
        state
            .conflicts
            .upsert(conflict_record("c1", DataType::Trip, "t1"), Vec::new());
        state.conflicts.upsert(
            Conflict::placeholder(&change, &DeviceId::new("laptop")),
            vec![change],
        );
        let (store, _) = store_with(&transport, state);

        let malformed = Resolution::manual(json!("text"));
        assert!(matches!(
            store.resolve(&ConflictId::new("c1"), &malformed).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            store
                .resolve(&ConflictId::new("missing"), &Resolution::merge())
                .await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store
                .resolve(&ConflictId::new("pending:trip:t5"), &Resolution::merge())
                .await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(transport.calls().resolve_conflict, 0);
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dismiss_keeps_held_changes_pending() {
        let transport = ScriptedTransport::new();
        let mut state = SyncState::default();
        let held = state
            .log
            .append(DataType::Trip, "t1", Operation::Update, json!({}));
        state
            .conflicts
            .upsert(conflict_record("c1", DataType::Trip, "t1"), vec![held]);
        let (store, shared) = store_with(&transport, state);

        assert!(store.dismiss(&ConflictId::new("c1")).await);
        assert!(!store.dismiss(&ConflictId::new("c1")).await);
        assert_eq!(store.count().await, 0);
        assert_eq!(
            shared.lock().await.log.entries()[0].id,
            EntityId::new("t1")
        );
        assert_eq!(transport.calls().resolve_conflict, 0);
    }
}
