//! Server-side sync bookkeeping models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DataType, DeviceId};

const DEFAULT_APP_VERSION: &str = "1.0.0";

/// Description of the installation sent on registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
}

impl DeviceInfo {
    /// Describe the running client
    #[must_use]
    pub fn current(app_version: Option<&str>) -> Self {
        Self {
            user_agent: Some(format!("travelgrid/{}", env!("CARGO_PKG_VERSION"))),
            platform: Some(format!(
                "{}-{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
            app_version: Some(app_version.unwrap_or(DEFAULT_APP_VERSION).to_string()),
        }
    }
}

/// Per-device sync state as recorded by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSyncStatus {
    #[default]
    Synced,
    Pending,
    Conflict,
    Error,
}

impl RemoteSyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Conflict => "conflict",
            Self::Error => "error",
        }
    }
}

/// Server-tracked bookkeeping for one device and data type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub device_id: DeviceId,
    pub data_type: DataType,
    #[serde(default)]
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sync_status: RemoteSyncStatus,
}
