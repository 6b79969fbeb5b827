//! Client-side sync status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sync state of a data type scope, or of the whole session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Conflict,
    Error,
}

impl SyncStatus {
    /// Precedence when several scopes are folded into one session status
    pub(crate) const fn precedence(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Conflict => 1,
            Self::Error => 2,
            Self::Syncing => 3,
        }
    }

    /// Wire name of this status
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Conflict => "conflict",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
