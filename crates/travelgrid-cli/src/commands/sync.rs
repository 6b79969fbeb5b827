use super::common::{
    finish_session, format_conflict_line, format_outcome, start_service, CommandContext,
};
use crate::cli::{data_types_or_default, DataTypeArg};
use crate::error::CliError;

pub async fn run_sync(context: &CommandContext, data_types: &[DataTypeArg]) -> Result<(), CliError> {
    let service = start_service(context).await?;
    let mut first_error = None;
    for data_type in data_types_or_default(data_types) {
        match service.sync(data_type, None).await {
            Ok(outcome) => println!("{}", format_outcome(data_type, &outcome)),
            Err(error) => {
                eprintln!("{data_type}: sync failed: {error}");
                first_error.get_or_insert(error);
            }
        }
    }

    match service.fetch_conflicts().await {
        Ok(conflicts) if !conflicts.is_empty() => {
            println!("Open conflicts:");
            for conflict in &conflicts {
                println!("  {}", format_conflict_line(conflict));
            }
        }
        Ok(_) => {}
        Err(error) => tracing::warn!("Failed to fetch conflicts: {}", error),
    }

    let result = first_error.map_or(Ok(()), |error| Err(error.into()));
    finish_session(service, result).await
}
