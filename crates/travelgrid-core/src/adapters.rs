//! Typed facades fixing the service to one data type.

use serde_json::Value;

use crate::error::Result;
use crate::models::{Change, Conflict, DataType, EntityId, Operation};
use crate::service::SyncService;
use crate::sync::{StatusReport, SyncOutcome, SyncTransport};

macro_rules! scoped_adapter {
    ($(#[$meta:meta])* $name:ident, $data_type:expr) => {
        $(#[$meta])*
        pub struct $name<T: SyncTransport> {
            service: SyncService<T>,
        }

        impl<T: SyncTransport> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    service: self.service.clone(),
                }
            }
        }

        impl<T: SyncTransport> $name<T> {
            pub const DATA_TYPE: DataType = $data_type;

            pub const fn new(service: SyncService<T>) -> Self {
                Self { service }
            }

            pub async fn register(&self) -> Result<()> {
                self.service.register(Self::DATA_TYPE).await
            }

            pub async fn add_change(
                &self,
                id: impl Into<EntityId>,
                operation: Operation,
                data: Value,
            ) -> Change {
                self.service
                    .add_change(Self::DATA_TYPE, id, operation, data)
                    .await
            }

            pub async fn apply_optimistic<A, R>(
                &self,
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
                self.service
                    .apply_optimistic(Self::DATA_TYPE, id, operation, data, apply, rollback)
                    .await
            }

            pub async fn sync(&self, changes: Option<Vec<Change>>) -> Result<SyncOutcome> {
                self.service.sync(Self::DATA_TYPE, changes).await
            }

            pub async fn status(&self) -> StatusReport {
                self.service.status(Some(Self::DATA_TYPE)).await
            }

            pub async fn is_syncing(&self) -> bool {
                self.status().await.is_syncing
            }

            pub async fn conflicts(&self) -> Vec<Conflict> {
                self.service.conflicts_for(Self::DATA_TYPE).await
            }
        }
    };
}

scoped_adapter!(
    /// Sync facade for trips
    TripSync,
    DataType::Trip
);

scoped_adapter!(
    /// Sync facade for packing checklists
    ChecklistSync,
    DataType::Checklist
);

scoped_adapter!(
    /// Sync facade for budgets
    BudgetSync,
    DataType::Budget
);

/// Runs the adapted data types together, in a fixed order
pub struct GlobalSync<T: SyncTransport> {
    service: SyncService<T>,
}

impl<T: SyncTransport> Clone for GlobalSync<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<T: SyncTransport> GlobalSync<T> {
    pub const fn new(service: SyncService<T>) -> Self {
        Self { service }
    }

    /// Register for trip, checklist and budget
    pub async fn register_all(&self) -> Result<()> {
        for data_type in DataType::ADAPTED {
            self.service.register(data_type).await?;
        }
        Ok(())
    }

    /// Sync trip, checklist and budget.
    ///
    /// Every type is attempted even if an earlier one fails; the first
    /// failure is returned afterwards.
    pub async fn sync_all(&self) -> Result<Vec<(DataType, SyncOutcome)>> {
        let mut outcomes = Vec::with_capacity(DataType::ADAPTED.len());
        let mut first_error = None;
        for data_type in DataType::ADAPTED {
            match self.service.sync(data_type, None).await {
                Ok(outcome) => outcomes.push((data_type, outcome)),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(outcomes),
        }
    }

    pub async fn status(&self) -> StatusReport {
        self.service.status(None).await
    }
}
