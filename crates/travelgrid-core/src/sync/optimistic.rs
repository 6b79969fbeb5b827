//! Compensating rollbacks for optimistic local mutations

use std::collections::HashMap;
use std::fmt;

use crate::models::{Change, ChangeKey};

/// Undo step for a locally applied change
pub type RollbackHook = Box<dyn FnOnce() + Send + 'static>;

/// Rollback hooks keyed by the change they compensate.
///
/// Each hook is settled exactly once: dropped when its change is confirmed,
/// taken for execution when the change is abandoned.
#[derive(Default)]
pub(crate) struct OptimisticLedger {
    hooks: HashMap<ChangeKey, Vec<RollbackHook>>,
}

impl fmt::Debug for OptimisticLedger {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OptimisticLedger")
            .field("pending", &self.len())
            .finish()
    }
}

impl OptimisticLedger {
    pub(crate) fn record(&mut self, change: &Change, hook: RollbackHook) {
        self.hooks.entry(change.key()).or_default().push(hook);
    }

    /// Drop the hooks of changes the server kept
    pub(crate) fn confirm(&mut self, changes: &[Change]) -> usize {
        self.take(changes).len()
    }

    /// Remove and return the hooks of `changes`, oldest first
    pub(crate) fn take(&mut self, changes: &[Change]) -> Vec<RollbackHook> {
        let mut taken = Vec::new();
        for change in changes {
            let key = change.key();
            let Some(hooks) = self.hooks.get_mut(&key) else {
                continue;
            };
            if !hooks.is_empty() {
                taken.push(hooks.remove(0));
            }
            if hooks.is_empty() {
                self.hooks.remove(&key);
            }
        }
        taken
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }
}

/// Run rollbacks collected while the session lock was held
pub(crate) fn run_rollbacks(hooks: Vec<RollbackHook>) {
    if hooks.is_empty() {
        return;
    }
    tracing::info!("Rolling back {} optimistic change(s)", hooks.len());
    for hook in hooks {
        hook();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, Operation};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_hook(counter: &Arc<AtomicUsize>) -> RollbackHook {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn confirmed_hooks_never_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let change = Change::new(DataType::Trip, "t1", Operation::Update, json!({}));
        let mut ledger = OptimisticLedger::default();
        ledger.record(&change, counting_hook(&counter));

        assert_eq!(ledger.confirm(std::slice::from_ref(&change)), 1);
        run_rollbacks(ledger.take(std::slice::from_ref(&change)));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn taken_hooks_run_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let change = Change::new(DataType::Budget, "b1", Operation::Create, json!({}));
        let mut ledger = OptimisticLedger::default();
        ledger.record(&change, counting_hook(&counter));
        ledger.record(&change, counting_hook(&counter));

        run_rollbacks(ledger.take(std::slice::from_ref(&change)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.len(), 1);

        run_rollbacks(ledger.take(std::slice::from_ref(&change)));
        run_rollbacks(ledger.take(std::slice::from_ref(&change)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
