pub mod common;
pub mod completions;
pub mod config;
pub mod conflicts;
pub mod device;
pub mod push;
pub mod register;
pub mod status;
pub mod sync;

pub use common::CommandContext;
pub use completions::run_completions;
pub use config::run_config;
pub use conflicts::run_conflicts;
pub use device::run_device;
pub use push::{run_push, PushInput};
pub use register::run_register;
pub use status::run_status;
pub use sync::run_sync;
