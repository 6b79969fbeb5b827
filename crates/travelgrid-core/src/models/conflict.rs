//! Sync conflict and resolution models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::{Change, ConflictId, DataType, DeviceId, EntityId};
use crate::error::{Error, Result};

const PLACEHOLDER_PREFIX: &str = "pending:";

/// One side of a conflict
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
}

/// How the server classified a divergence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    #[default]
    EditConflict,
    DeleteConflict,
    StructureConflict,
}

/// Server-side lifecycle of a conflict record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    #[default]
    Pending,
    Resolved,
    Discarded,
}

/// A server-detected divergence between two devices' versions of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "_id", alias = "id")]
    pub id: ConflictId,
    pub data_type: DataType,
    pub data_id: EntityId,
    #[serde(default)]
    pub local_version: VersionSnapshot,
    #[serde(default)]
    pub remote_version: VersionSnapshot,
    #[serde(default)]
    pub conflict_type: ConflictType,
    #[serde(default)]
    pub status: ConflictStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Conflict {
    /// Local stand-in for a conflict the server reported only by entity id.
    ///
    /// The remote side is unknown until the full record is fetched; resolving
    /// a placeholder is refused.
    #[must_use]
    pub fn placeholder(change: &Change, device_id: &DeviceId) -> Self {
        Self {
            id: ConflictId::new(format!(
                "{PLACEHOLDER_PREFIX}{}:{}",
                change.data_type, change.id
            )),
            data_type: change.data_type,
            data_id: change.id.clone(),
            local_version: VersionSnapshot {
                data: change.data.clone(),
                timestamp: Some(change.timestamp),
                device_id: Some(device_id.clone()),
            },
            remote_version: VersionSnapshot::default(),
            conflict_type: ConflictType::EditConflict,
            status: ConflictStatus::Pending,
            created_at: Some(Utc::now()),
        }
    }

    /// Whether this record was synthesized locally
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id.as_str().starts_with(PLACEHOLDER_PREFIX)
    }
}

/// Strategy chosen to settle a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    AcceptRemote,
    AcceptLocal,
    Merge,
    Manual,
}

impl ResolutionStrategy {
    /// Wire name of this strategy
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AcceptRemote => "accept_remote",
            Self::AcceptLocal => "accept_local",
            Self::Merge => "merge",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "accept_remote" | "remote" => Ok(Self::AcceptRemote),
            "accept_local" | "local" => Ok(Self::AcceptLocal),
            "merge" => Ok(Self::Merge),
            "manual" => Ok(Self::Manual),
            other => Err(Error::InvalidInput(format!(
                "unknown resolution strategy '{other}'"
            ))),
        }
    }
}

/// Who settled a conflict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedBy {
    #[default]
    User,
    System,
}

/// The user's chosen strategy plus data for settling a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    #[serde(default)]
    pub resolved_by: ResolvedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_data: Option<Value>,
}

impl Resolution {
    /// Keep the other device's version
    #[must_use]
    pub const fn accept_remote() -> Self {
        Self::with_strategy(ResolutionStrategy::AcceptRemote)
    }

    /// Keep this device's version
    #[must_use]
    pub const fn accept_local() -> Self {
        Self::with_strategy(ResolutionStrategy::AcceptLocal)
    }

    /// Let the server merge non-conflicting fields
    #[must_use]
    pub const fn merge() -> Self {
        Self::with_strategy(ResolutionStrategy::Merge)
    }

    /// Settle with user-edited data
    #[must_use]
    pub fn manual(data: Value) -> Self {
        Self {
            strategy: ResolutionStrategy::Manual,
            resolved_by: ResolvedBy::User,
            resolution_data: Some(data),
        }
    }

    /// Parse user-edited JSON into a manual resolution.
    ///
    /// Input that does not decode as a JSON object or array is rejected here
    /// so it never reaches the server.
    pub fn manual_from_json(raw: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(raw.trim()).map_err(|error| {
            Error::InvalidInput(format!("manual resolution data is not valid JSON: {error}"))
        })?;
        let resolution = Self::manual(data);
        resolution.validate()?;
        Ok(resolution)
    }

    /// Build a resolution for `strategy`, parsing optional raw JSON data.
    pub fn from_parts(strategy: ResolutionStrategy, raw_data: Option<&str>) -> Result<Self> {
        if strategy == ResolutionStrategy::Manual {
            let raw = raw_data.ok_or_else(|| {
                Error::InvalidInput("manual resolution requires resolution data".to_string())
            })?;
            return Self::manual_from_json(raw);
        }

        let mut resolution = Self::with_strategy(strategy);
        if let Some(raw) = raw_data {
            let data = serde_json::from_str(raw.trim()).map_err(|error| {
                Error::InvalidInput(format!("resolution data is not valid JSON: {error}"))
            })?;
            resolution.resolution_data = Some(data);
        }
        Ok(resolution)
    }

    /// Check the resolution is well-formed before submission
    pub fn validate(&self) -> Result<()> {
        if self.strategy != ResolutionStrategy::Manual {
            return Ok(());
        }
        match &self.resolution_data {
            Some(Value::Object(_) | Value::Array(_)) => Ok(()),
            Some(_) => Err(Error::InvalidInput(
                "manual resolution data must be a JSON object or array".to_string(),
            )),
            None => Err(Error::InvalidInput(
                "manual resolution requires resolution data".to_string(),
            )),
        }
    }

    const fn with_strategy(strategy: ResolutionStrategy) -> Self {
        Self {
            strategy,
            resolved_by: ResolvedBy::User,
            resolution_data: None,
        }
    }
}
