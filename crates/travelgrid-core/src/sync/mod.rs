//! Multi-device sync: change log, transport, engine and conflict handling.

mod change_log;
mod conflicts;
mod engine;
mod http;
mod optimistic;
mod state;
mod status;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use change_log::ChangeLog;
pub use conflicts::ConflictStore;
pub use engine::{SyncEngine, SyncOutcome};
pub use http::HttpSyncTransport;
pub use optimistic::RollbackHook;
pub use state::SyncSession;
pub use status::StatusReport;
pub use transport::{
    ConflictRef, PushRequest, PushResponse, RegisterDeviceRequest, SyncTransport, TransportError,
    TransportResult,
};

pub(crate) use optimistic::run_rollbacks;
pub(crate) use state::{SharedState, SyncState};
