use travelgrid_core::{
    ConflictId, DataType, HttpSyncTransport, Resolution, ResolutionStrategy, SyncService,
};

use super::common::{finish_session, format_conflict_line, start_service, CommandContext};
use crate::cli::{ConflictCommands, DataTypeArg};
use crate::error::CliError;

pub async fn run_conflicts(
    context: &CommandContext,
    command: ConflictCommands,
) -> Result<(), CliError> {
    match command {
        ConflictCommands::List { data_type, json } => {
            let service = start_service(context).await?;
            let result = list_conflicts(&service, data_type, json).await;
            finish_session(service, result).await
        }
        ConflictCommands::Resolve { id, strategy, data } => {
            let resolution = Resolution::from_parts(strategy.into(), data.as_deref())?;
            let service = start_service(context).await?;
            let result = resolve_conflict(&service, &id, &resolution).await;
            finish_session(service, result).await
        }
    }
}

async fn list_conflicts(
    service: &SyncService<HttpSyncTransport>,
    data_type: Option<DataTypeArg>,
    json: bool,
) -> Result<(), CliError> {
    service.fetch_conflicts().await?;
    let conflicts = match data_type {
        Some(data_type) => service.conflicts_for(DataType::from(data_type)).await,
        None => service.conflicts().await,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No open conflicts.");
        return Ok(());
    }
    for conflict in &conflicts {
        println!("{}", format_conflict_line(conflict));
    }
    Ok(())
}

async fn resolve_conflict(
    service: &SyncService<HttpSyncTransport>,
    id: &str,
    resolution: &Resolution,
) -> Result<(), CliError> {
    service.fetch_conflicts().await?;

    let conflict_id = ConflictId::new(id.trim());
    if !service.resolve(&conflict_id, resolution).await? {
        return Err(CliError::ResolutionRejected(conflict_id.to_string()));
    }

    println!("{}", resolved_message(&conflict_id, resolution.strategy));
    Ok(())
}

pub fn resolved_message(conflict_id: &ConflictId, strategy: ResolutionStrategy) -> String {
    format!("Resolved conflict {conflict_id} with {strategy}")
}
