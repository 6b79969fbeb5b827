use chrono::Utc;
use serde::Serialize;
use travelgrid_core::{
    DataType, DeviceId, HttpSyncTransport, StatusReport, SyncMetadata, SyncService,
};

use super::common::{finish_session, format_metadata_line, start_service, CommandContext};
use crate::cli::DataTypeArg;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub device_id: DeviceId,
    pub local: StatusReport,
    pub remote: Vec<SyncMetadata>,
}

pub async fn run_status(
    context: &CommandContext,
    data_type: Option<DataTypeArg>,
    json: bool,
) -> Result<(), CliError> {
    let service = start_service(context).await?;
    let result = print_status(&service, data_type.map(DataType::from), json).await;
    finish_session(service, result).await
}

async fn print_status(
    service: &SyncService<HttpSyncTransport>,
    scope: Option<DataType>,
    json: bool,
) -> Result<(), CliError> {
    let remote = filter_metadata(service.remote_status().await?, scope);
    let output = StatusOutput {
        device_id: service.device_id().clone(),
        local: service.status(scope).await,
        remote,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for line in status_lines(&output) {
        println!("{line}");
    }
    Ok(())
}

pub fn filter_metadata(metadata: Vec<SyncMetadata>, scope: Option<DataType>) -> Vec<SyncMetadata> {
    metadata
        .into_iter()
        .filter(|entry| scope.map_or(true, |data_type| entry.data_type == data_type))
        .collect()
}

pub fn status_lines(output: &StatusOutput) -> Vec<String> {
    let now = Utc::now();
    let mut lines = vec![format!("Device: {}", output.device_id)];
    if output.remote.is_empty() {
        lines.push("Not registered for any data type. Run `travelgrid register`.".to_string());
    } else {
        lines.extend(
            output
                .remote
                .iter()
                .map(|metadata| format_metadata_line(metadata, now)),
        );
    }
    lines.push(format!(
        "Local: {} ({} pending, {} conflicts, last synced {})",
        output.local.label(),
        output.local.pending_count,
        output.local.conflict_count,
        output.local.last_sync_label(now)
    ));
    lines
}
