use super::common::{finish_session, start_service, CommandContext};
use crate::cli::{data_types_or_default, DataTypeArg};
use crate::error::CliError;

pub async fn run_register(
    context: &CommandContext,
    data_types: &[DataTypeArg],
) -> Result<(), CliError> {
    let service = start_service(context).await?;
    let mut result = Ok(());
    for data_type in data_types_or_default(data_types) {
        if let Err(error) = service.register(data_type).await {
            result = Err(error.into());
            break;
        }
        println!("Registered {} for {}", service.device_id(), data_type);
    }
    finish_session(service, result).await
}
