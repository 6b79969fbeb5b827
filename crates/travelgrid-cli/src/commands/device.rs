use travelgrid_core::identity::{DeviceIdentity, FileDeviceIdStore};
use travelgrid_core::Error;

use super::common::{build_transport, resolve_sync_config, CommandContext};
use crate::error::CliError;

pub async fn run_device(context: &CommandContext) -> Result<(), CliError> {
    let config = resolve_sync_config(context.profile())?;
    let transport = build_transport(&config)?;
    let path = context.device_file()?;
    let mut identity = DeviceIdentity::new(FileDeviceIdStore::new(&path));

    let device_id = identity.get_or_create(&transport).await?.ok_or_else(|| {
        Error::SyncUnavailable("no device id could be obtained from the server".to_string())
    })?;
    println!("{device_id}");
    tracing::debug!("Device id stored at {}", path.display());
    Ok(())
}
