//! Pending change model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::EntityId;
use crate::error::Error;

/// Logical category of synchronized entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Trip,
    Checklist,
    Budget,
    Itinerary,
    Moodboard,
}

impl DataType {
    /// Every data type the sync server tracks metadata for.
    pub const ALL: [Self; 5] = [
        Self::Trip,
        Self::Checklist,
        Self::Budget,
        Self::Itinerary,
        Self::Moodboard,
    ];

    /// Data types with a dedicated adapter, in global sync order.
    pub const ADAPTED: [Self; 3] = [Self::Trip, Self::Checklist, Self::Budget];

    /// Wire name of this data type
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Checklist => "checklist",
            Self::Budget => "budget",
            Self::Itinerary => "itinerary",
            Self::Moodboard => "moodboard",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|data_type| data_type.as_str() == value)
            .ok_or_else(|| Error::InvalidInput(format!("unknown data type '{}'", s.trim())))
    }
}

/// Kind of mutation a change represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Wire name of this operation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown operation '{other}'"))),
        }
    }
}

/// A single pending local mutation awaiting synchronization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Entity the change applies to
    pub id: EntityId,
    /// Category of the entity
    pub data_type: DataType,
    /// Mutation kind
    pub operation: Operation,
    /// Entity payload (full document for create/update)
    #[serde(default)]
    pub data: Value,
    /// When the change was recorded (UTC, ISO 8601 on the wire)
    pub timestamp: DateTime<Utc>,
}

/// Identity of a change inside the log
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeKey {
    pub data_type: DataType,
    pub id: EntityId,
    pub timestamp: DateTime<Utc>,
}

impl Change {
    /// Record a change stamped with the current time
    #[must_use]
    pub fn new(data_type: DataType, id: impl Into<EntityId>, operation: Operation, data: Value) -> Self {
        Self {
            id: id.into(),
            data_type,
            operation,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Identity used to match acknowledged entries back to the log
    #[must_use]
    pub fn key(&self) -> ChangeKey {
        ChangeKey {
            data_type: self.data_type,
            id: self.id.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Whether two changes denote the same log entry
    #[must_use]
    pub fn same_entry(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.id == other.id
            && self.timestamp == other.timestamp
    }
}
