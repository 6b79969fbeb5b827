//! Data models for TravelGrid sync

mod change;
mod conflict;
mod ids;
mod metadata;
mod status;

pub use change::{Change, ChangeKey, DataType, Operation};
pub use conflict::{
    Conflict, ConflictStatus, ConflictType, Resolution, ResolutionStrategy, ResolvedBy,
    VersionSnapshot,
};
pub use ids::{ConflictId, DeviceId, EntityId};
pub use metadata::{DeviceInfo, RemoteSyncStatus, SyncMetadata};
pub use status::SyncStatus;
