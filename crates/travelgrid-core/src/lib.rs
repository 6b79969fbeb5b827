//! travelgrid-core - Core library for TravelGrid sync
//!
//! This crate contains the multi-device synchronization layer shared by all
//! TravelGrid clients: device identity, the pending-change log, the sync
//! transport, the sync engine, and conflict resolution.

pub mod adapters;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod service;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    Change, Conflict, ConflictId, DataType, DeviceId, DeviceInfo, EntityId, Operation, Resolution,
    ResolutionStrategy, SyncMetadata, SyncStatus,
};
pub use service::SyncService;
pub use sync::{HttpSyncTransport, StatusReport, SyncOutcome, SyncTransport};
