use travelgrid_core::{Conflict, DataType, SyncOutcome};

use super::common::{
    entity_id_or_new, finish_session, format_outcome, parse_json_data, start_service,
    CommandContext,
};
use crate::cli::{DataTypeArg, OperationArg};
use crate::error::CliError;

#[derive(Debug)]
pub struct PushInput {
    pub data_type: DataTypeArg,
    pub operation: OperationArg,
    pub id: Option<String>,
    pub data: String,
    pub no_sync: bool,
}

pub async fn run_push(context: &CommandContext, input: PushInput) -> Result<(), CliError> {
    let data = parse_json_data(&input.data)?;
    let data_type = DataType::from(input.data_type);
    let service = start_service(context).await?;

    let change = service
        .add_change(
            data_type,
            entity_id_or_new(input.id),
            input.operation.into(),
            data,
        )
        .await;
    println!("Queued {} {} {}", change.operation, data_type, change.id);

    if input.no_sync {
        return finish_session(service, Ok(())).await;
    }

    let result = service.sync(data_type, None).await.map_err(CliError::from);
    if let Ok(outcome) = &result {
        println!("{}", format_outcome(data_type, outcome));
        for conflict in outcome_conflicts(outcome) {
            println!(
                "Conflict {} on {}. Run `travelgrid conflicts resolve {} --strategy <STRATEGY>`.",
                conflict.id, conflict.data_id, conflict.id
            );
        }
    }
    finish_session(service, result.map(|_| ())).await
}

pub fn outcome_conflicts(outcome: &SyncOutcome) -> &[Conflict] {
    match outcome {
        SyncOutcome::Conflicted { conflicts, .. } => conflicts,
        _ => &[],
    }
}
