//! Remote sync endpoint contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    Change, Conflict, ConflictId, DataType, DeviceId, DeviceInfo, EntityId, Resolution,
    SyncMetadata,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid sync transport configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("Sync API error: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse sync payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid sync payload: {0}")]
    InvalidPayload(String),
}

impl TransportError {
    /// Whether repeating the same request could succeed.
    ///
    /// Only used to offer a retry affordance; nothing retries automatically.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(error) => {
                error.is_timeout()
                    || error.is_connect()
                    || error
                        .status()
                        .map_or(true, |status| is_retryable_status(status.as_u16()))
            }
            Self::Unreachable(_) => true,
            Self::Api { status, .. } => is_retryable_status(*status),
            Self::InvalidConfiguration(_) | Self::Json(_) | Self::InvalidPayload(_) => false,
        }
    }
}

const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || status >= 500
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Body of `POST /sync/register-device`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub user_id: String,
    pub device_id: DeviceId,
    pub device_info: DeviceInfo,
    pub data_type: DataType,
}

/// Body of `POST /sync/sync`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub user_id: String,
    pub device_id: DeviceId,
    pub data_type: DataType,
    pub changes: Vec<Change>,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

/// A conflict as reported by a push: either the full record or the id of
/// the implicated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConflictRef {
    Record(Box<Conflict>),
    EntityId(EntityId),
}

impl ConflictRef {
    /// Entity the conflict implicates
    #[must_use]
    pub fn data_id(&self) -> &EntityId {
        match self {
            Self::Record(conflict) => &conflict.data_id,
            Self::EntityId(id) => id,
        }
    }
}

/// Response of `POST /sync/sync`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    #[serde(default)]
    pub conflicts: Vec<ConflictRef>,
    #[serde(default)]
    pub accepted_change_ids: Option<Vec<EntityId>>,
    /// Either a count or the list of processed changes, depending on server
    #[serde(default)]
    pub processed_changes: Option<Value>,
}

impl PushResponse {
    /// Number of changes the server reports having processed
    #[must_use]
    pub fn processed_count(&self) -> Option<usize> {
        match self.processed_changes.as_ref()? {
            Value::Array(items) => Some(items.len()),
            Value::Number(count) => count.as_u64().and_then(|count| usize::try_from(count).ok()),
            _ => None,
        }
    }
}

/// Network calls the sync core depends on.
#[allow(async_fn_in_trait)]
pub trait SyncTransport: Send + Sync {
    /// Ask the server to issue a new device identifier
    async fn generate_device_id(&self) -> TransportResult<DeviceId>;

    /// Register this device for a data type
    async fn register_device(&self, request: &RegisterDeviceRequest) -> TransportResult<()>;

    /// Submit pending changes for one data type
    async fn push(&self, request: &PushRequest) -> TransportResult<PushResponse>;

    /// Server-side sync metadata for this device
    async fn fetch_status(
        &self,
        user_id: &str,
        device_id: &DeviceId,
    ) -> TransportResult<Vec<SyncMetadata>>;

    /// Open conflicts for the user
    async fn fetch_conflicts(&self, user_id: &str) -> TransportResult<Vec<Conflict>>;

    /// Settle one conflict
    async fn resolve_conflict(
        &self,
        conflict_id: &ConflictId,
        resolution: &Resolution,
    ) -> TransportResult<()>;
}
