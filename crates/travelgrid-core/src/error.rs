//! Error types for travelgrid-core

use thiserror::Error;

use crate::sync::TransportError;

/// Result type alias using travelgrid-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in travelgrid-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote sync endpoint failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Conflict or entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input, rejected before anything is sent
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistent local storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// No device identifier could be obtained
    #[error("Sync is unavailable: {0}")]
    SyncUnavailable(String),
}

impl Error {
    /// Returns true when the failure came from the remote sync endpoint.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
