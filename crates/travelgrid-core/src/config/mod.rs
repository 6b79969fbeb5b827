//! Client sync configuration.
//!
//! Provides `SyncConfig`, the validated settings a client needs to talk to the
//! sync endpoint on behalf of a signed-in user.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for one signed-in sync session.
///
/// `api_base_url` points at the API root the `/sync/...` routes hang off
/// (for example `http://localhost:5000/api`).
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("api_base_url", &self.api_base_url)
            .field("user_id", &self.user_id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("app_version", &self.app_version)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SyncConfig {
    /// Create a config for `user_id` against `api_base_url`
    pub fn new(api_base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(api_base_url.into()),
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Attach a bearer token sent with every request
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Normalized API base URL without a trailing slash
    pub fn base_url(&self) -> Result<String> {
        let url = normalize_text_option(self.api_base_url.clone()).ok_or_else(|| {
            Error::InvalidInput("sync API base URL is not configured".to_string())
        })?;
        if !is_http_url(&url) {
            return Err(Error::InvalidInput(
                "sync API base URL must include http:// or https://".to_string(),
            ));
        }
        Ok(url.trim_end_matches('/').to_string())
    }

    /// Signed-in user the session syncs for
    pub fn user(&self) -> Result<String> {
        normalize_text_option(self.user_id.clone())
            .ok_or_else(|| Error::InvalidInput("sync user id is not configured".to_string()))
    }

    /// Bearer token, if any
    pub fn token(&self) -> Option<String> {
        normalize_text_option(self.access_token.clone())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Validate every required field at once
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        self.user()?;
        Ok(())
    }

    /// Overlay non-empty values from `other` onto this config
    #[must_use]
    pub fn merged_with(mut self, other: Self) -> Self {
        if let Some(url) = normalize_text_option(other.api_base_url) {
            self.api_base_url = Some(url);
        }
        if let Some(user) = normalize_text_option(other.user_id) {
            self.user_id = Some(user);
        }
        if let Some(token) = normalize_text_option(other.access_token) {
            self.access_token = Some(token);
        }
        if let Some(version) = normalize_text_option(other.app_version) {
            self.app_version = Some(version);
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        self
    }
}
