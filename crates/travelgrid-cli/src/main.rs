//! TravelGrid CLI - sync trips, checklists and budgets from the terminal

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{
    run_completions, run_config, run_conflicts, run_device, run_push, run_register, run_status,
    run_sync, CommandContext, PushInput,
};
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn env_filter() -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match "travelgrid=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = CommandContext {
        profile: cli.profile,
        device_file: cli.device_file,
    };

    match cli.command {
        Commands::Config { command } => run_config(command, context.profile())?,
        Commands::Device => run_device(&context).await?,
        Commands::Register { data_types } => run_register(&context, &data_types).await?,
        Commands::Status { data_type, json } => run_status(&context, data_type, json).await?,
        Commands::Push {
            data_type,
            op,
            id,
            data,
            no_sync,
        } => {
            run_push(
                &context,
                PushInput {
                    data_type,
                    operation: op,
                    id,
                    data,
                    no_sync,
                },
            )
            .await?;
        }
        Commands::Sync { data_types } => run_sync(&context, &data_types).await?,
        Commands::Conflicts { command } => run_conflicts(&context, command).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
