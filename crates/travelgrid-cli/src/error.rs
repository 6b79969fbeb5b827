use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] travelgrid_core::Error),
    #[error(transparent)]
    Transport(#[from] travelgrid_core::sync::TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid JSON data: {0}")]
    InvalidData(String),
    #[error("Conflict {0} is still open; the server did not accept the resolution")]
    ResolutionRejected(String),
    #[error(
        "Sync is not configured. Run `travelgrid config init --api-url <URL> --user-id <ID>`, or set TRAVELGRID_API_URL and TRAVELGRID_USER_ID."
    )]
    SyncNotConfigured,
}
