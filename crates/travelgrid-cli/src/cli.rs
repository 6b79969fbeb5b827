use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use travelgrid_core::{DataType, Operation, ResolutionStrategy};

#[derive(Parser)]
#[command(name = "travelgrid")]
#[command(about = "Sync TravelGrid trips, checklists and budgets across devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name holding the sync endpoint and user
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Override the file the device id is stored in
    #[arg(long, global = true, value_name = "PATH")]
    pub device_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print this installation's device id, creating it if needed
    Device,
    /// Register this device for data types
    Register {
        /// Data types to register (trip, checklist and budget when omitted)
        #[arg(value_enum)]
        data_types: Vec<DataTypeArg>,
    },
    /// Show server-side sync status for this device
    Status {
        /// Only show one data type
        #[arg(long, value_enum)]
        data_type: Option<DataTypeArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a change and sync it
    Push {
        /// Data type of the entity
        #[arg(long, value_enum)]
        data_type: DataTypeArg,
        /// Mutation kind
        #[arg(long, value_enum)]
        op: OperationArg,
        /// Entity id (a new id is generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Entity payload as JSON
        #[arg(long, value_name = "JSON")]
        data: String,
        /// Queue only; do not contact the server
        #[arg(long)]
        no_sync: bool,
    },
    /// Run sync cycles
    Sync {
        /// Data types to sync (trip, checklist and budget when omitted)
        #[arg(value_enum)]
        data_types: Vec<DataTypeArg>,
    },
    /// Inspect and resolve sync conflicts
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update a profile
    Init {
        /// API base URL the /sync routes live under
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// User the device syncs for
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Bearer token sent with every request
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
        /// App version reported on registration
        #[arg(long, value_name = "VERSION")]
        app_version: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile
    Show,
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List open conflicts
    List {
        /// Only show one data type
        #[arg(long, value_enum)]
        data_type: Option<DataTypeArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict
    Resolve {
        /// Conflict id
        id: String,
        /// Resolution strategy
        #[arg(long, value_enum)]
        strategy: StrategyArg,
        /// Resolution data as JSON (required for manual)
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DataTypeArg {
    Trip,
    Checklist,
    Budget,
    Itinerary,
    Moodboard,
}

impl From<DataTypeArg> for DataType {
    fn from(value: DataTypeArg) -> Self {
        match value {
            DataTypeArg::Trip => Self::Trip,
            DataTypeArg::Checklist => Self::Checklist,
            DataTypeArg::Budget => Self::Budget,
            DataTypeArg::Itinerary => Self::Itinerary,
            DataTypeArg::Moodboard => Self::Moodboard,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OperationArg {
    Create,
    Update,
    Delete,
}

impl From<OperationArg> for Operation {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Create => Self::Create,
            OperationArg::Update => Self::Update,
            OperationArg::Delete => Self::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    AcceptRemote,
    AcceptLocal,
    Merge,
    Manual,
}

impl From<StrategyArg> for ResolutionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::AcceptRemote => Self::AcceptRemote,
            StrategyArg::AcceptLocal => Self::AcceptLocal,
            StrategyArg::Merge => Self::Merge,
            StrategyArg::Manual => Self::Manual,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

/// Map CLI data type arguments, defaulting to the adapted data types
pub fn data_types_or_default(args: &[DataTypeArg]) -> Vec<DataType> {
    if args.is_empty() {
        DataType::ADAPTED.to_vec()
    } else {
        args.iter().copied().map(DataType::from).collect()
    }
}
