//! In-memory queue of pending local changes

use serde_json::Value;

use crate::models::{Change, DataType, EntityId, Operation};

/// Ordered queue of unsynchronized changes for one session.
///
/// Entries leave the log only through [`ChangeLog::prune`] (matched by
/// identity) or [`ChangeLog::clear`], so a snapshot taken before a push can
/// be pruned afterwards without touching entries appended in between.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    entries: Vec<Change>,
}

impl ChangeLog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a change stamped with the current time
    pub fn append(
        &mut self,
        data_type: DataType,
        id: impl Into<EntityId>,
        operation: Operation,
        data: Value,
    ) -> Change {
        let change = Change::new(data_type, id, operation, data);
        self.push(change.clone());
        change
    }

    pub(crate) fn push(&mut self, change: Change) {
        tracing::debug!(
            "Queued {} {} for {}",
            change.operation,
            change.id,
            change.data_type
        );
        self.entries.push(change);
    }

    /// Snapshot of the entries for `data_type`, in insertion order
    #[must_use]
    pub fn drain(&self, data_type: DataType) -> Vec<Change> {
        self.entries
            .iter()
            .filter(|change| change.data_type == data_type)
            .cloned()
            .collect()
    }

    /// Remove exactly the given entries.
    ///
    /// Each matched change removes at most one log entry, earliest first.
    /// Returns the number of entries removed.
    pub fn prune(&mut self, matched: &[Change]) -> usize {
        let mut removed = 0;
        for target in matched {
            if let Some(index) = self
                .entries
                .iter()
                .position(|change| change.same_entry(target))
            {
                self.entries.remove(index);
                removed += 1;
            }
        }
        removed
    }

    /// Remove every entry, or only those for `data_type`.
    ///
    /// Returns the removed entries.
    pub fn clear(&mut self, data_type: Option<DataType>) -> Vec<Change> {
        match data_type {
            None => std::mem::take(&mut self.entries),
            Some(data_type) => {
                let (removed, kept) = std::mem::take(&mut self.entries)
                    .into_iter()
                    .partition(|change| change.data_type == data_type);
                self.entries = kept;
                removed
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pending entries for `data_type`
    #[must_use]
    pub fn pending_count(&self, data_type: DataType) -> usize {
        self.entries
            .iter()
            .filter(|change| change.data_type == data_type)
            .count()
    }

    /// All entries in insertion order
    #[must_use]
    pub fn entries(&self) -> &[Change] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn drain_filters_by_data_type_in_order() {
        let mut log = ChangeLog::new();
        log.append(DataType::Trip, "t1", Operation::Create, json!({}));
        log.append(DataType::Budget, "b1", Operation::Create, json!({}));
        log.append(DataType::Trip, "t2", Operation::Update, json!({}));

        let ids: Vec<_> = log
            .drain(DataType::Trip)
            .into_iter()
            .map(|change| change.id.to_string())
            .collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn prune_keeps_entries_appended_after_snapshot() {
        let mut log = ChangeLog::new();
        log.append(DataType::Trip, "t1", Operation::Create, json!({"v": 1}));
        let snapshot = log.drain(DataType::Trip);
        let late = log.append(DataType::Trip, "t1", Operation::Update, json!({"v": 2}));

        assert_eq!(log.prune(&snapshot), 1);
        assert_eq!(log.entries(), std::slice::from_ref(&late));
    }

    #[test]
    fn prune_removes_one_entry_per_match() {
        let mut log = ChangeLog::new();
        let first = log.append(DataType::Trip, "t1", Operation::Update, json!({"v": 1}));
        let mut twin = first.clone();
        twin.data = json!({"v": 2});
        log.push(twin.clone());

        assert_eq!(log.prune(std::slice::from_ref(&first)), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].data, twin.data);
    }

    #[test]
    fn prune_ignores_unknown_entries() {
        let mut log = ChangeLog::new();
        log.append(DataType::Trip, "t1", Operation::Create, json!({}));
        let stranger = Change::new(DataType::Trip, "t9", Operation::Delete, json!(null));

        assert_eq!(log.prune(&[stranger]), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn clear_by_data_type_leaves_others() {
        let mut log = ChangeLog::new();
        log.append(DataType::Trip, "t1", Operation::Create, json!({}));
        log.append(DataType::Checklist, "c1", Operation::Create, json!({}));

        let removed = log.clear(Some(DataType::Trip));
        assert_eq!(removed.len(), 1);
        assert_eq!(log.pending_count(DataType::Trip), 0);
        assert_eq!(log.pending_count(DataType::Checklist), 1);

        log.clear(None);
        assert!(log.is_empty());
    }
}
