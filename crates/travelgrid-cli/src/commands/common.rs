use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use travelgrid_core::config::SyncConfig;
use travelgrid_core::identity::FileDeviceIdStore;
use travelgrid_core::util::{format_last_sync, normalize_text_option};
use travelgrid_core::{
    Conflict, DataType, DeviceInfo, EntityId, HttpSyncTransport, SyncMetadata, SyncOutcome,
    SyncService, SyncTransport,
};

use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub const API_URL_ENV: &str = "TRAVELGRID_API_URL";
pub const USER_ID_ENV: &str = "TRAVELGRID_USER_ID";
pub const ACCESS_TOKEN_ENV: &str = "TRAVELGRID_ACCESS_TOKEN";
pub const DEVICE_FILE_ENV: &str = "TRAVELGRID_DEVICE_FILE";

/// Global options shared by every command
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub profile: Option<String>,
    pub device_file: Option<PathBuf>,
}

impl CommandContext {
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn device_file(&self) -> Result<PathBuf, CliError> {
        resolve_device_file(
            self.device_file.as_deref(),
            env::var(DEVICE_FILE_ENV).ok(),
            dirs::data_dir(),
        )
    }
}

/// Settings taken from `TRAVELGRID_*` variables via `lookup`
pub fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> SyncConfig {
    SyncConfig {
        api_base_url: lookup(API_URL_ENV),
        user_id: lookup(USER_ID_ENV),
        access_token: lookup(ACCESS_TOKEN_ENV),
        ..SyncConfig::default()
    }
}

pub fn resolve_sync_config(profile_name: Option<&str>) -> Result<SyncConfig, CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = profiles.resolve_profile_name(profile_name);
    let base = profiles
        .profile(&profile_name)
        .map(CliProfile::to_sync_config)
        .unwrap_or_default();
    let config = base.merged_with(env_overrides(|key| env::var(key).ok()));
    ensure_configured(&config)?;
    Ok(config)
}

pub fn ensure_configured(config: &SyncConfig) -> Result<(), CliError> {
    if normalize_text_option(config.api_base_url.clone()).is_none()
        || normalize_text_option(config.user_id.clone()).is_none()
    {
        return Err(CliError::SyncNotConfigured);
    }
    config.validate()?;
    Ok(())
}

/// `--device-file`, then `TRAVELGRID_DEVICE_FILE`, then the data directory
pub fn resolve_device_file(
    explicit: Option<&Path>,
    env_value: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<PathBuf, CliError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = normalize_text_option(env_value) {
        return Ok(PathBuf::from(path));
    }
    data_dir
        .map(|dir| dir.join("travelgrid").join("device.json"))
        .ok_or_else(|| CliError::Config("Failed to resolve a data directory".to_string()))
}

pub fn build_transport(config: &SyncConfig) -> Result<HttpSyncTransport, CliError> {
    Ok(HttpSyncTransport::from_config(config)?)
}

pub async fn start_service(
    context: &CommandContext,
) -> Result<SyncService<HttpSyncTransport>, CliError> {
    let config = resolve_sync_config(context.profile())?;
    let transport = build_transport(&config)?;
    let store = FileDeviceIdStore::new(context.device_file()?);
    let service = SyncService::start(transport, store, config.user()?).await?;
    Ok(service.with_device_info(DeviceInfo::current(config.app_version.as_deref())))
}

/// End the session on every exit path, then hand back the command's result
pub async fn finish_session<T: SyncTransport, R>(
    service: SyncService<T>,
    result: Result<R, CliError>,
) -> Result<R, CliError> {
    service.shutdown().await;
    result
}

pub fn parse_json_data(raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw.trim()).map_err(|error| CliError::InvalidData(error.to_string()))
}

/// Use the given id, or mint a time-ordered one for a new entity
pub fn entity_id_or_new(explicit: Option<String>) -> EntityId {
    normalize_text_option(explicit).map_or_else(
        || EntityId::new(uuid::Uuid::now_v7().to_string()),
        EntityId::new,
    )
}

pub fn format_conflict_line(conflict: &Conflict) -> String {
    let mut line = format!(
        "{}  {}  {}",
        conflict.id, conflict.data_type, conflict.data_id
    );
    if let Some(device_id) = &conflict.remote_version.device_id {
        line.push_str(&format!("  remote: {device_id}"));
    }
    if conflict.is_placeholder() {
        line.push_str("  (awaiting server record)");
    }
    line
}

pub fn format_metadata_line(metadata: &SyncMetadata, now: DateTime<Utc>) -> String {
    format!(
        "{:<10} {:<8} last synced: {}",
        metadata.data_type.as_str(),
        metadata.sync_status.as_str(),
        format_last_sync(metadata.last_sync_timestamp, now)
    )
}

pub fn format_outcome(data_type: DataType, outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Idle => format!("{data_type}: nothing to sync"),
        SyncOutcome::Synced { pushed, pruned } => {
            format!("{data_type}: pushed {pushed} change(s), {pruned} confirmed")
        }
        SyncOutcome::Conflicted { conflicts, pruned } => format!(
            "{data_type}: {} conflict(s), {pruned} change(s) confirmed",
            conflicts.len()
        ),
    }
}
