//! # apiworks CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Create a workspace owned by a user
//! - `status` - Show entity counts of a workspace
//! - `export` - Export a workspace bundle to a file
//! - `import` - Import a bundle file into a workspace
//! - `filter` - Narrow a bundle file to examples or flows

mod commands;

use crate::config::AppConfig;
use crate::error::AppError;
use apiworks_core::{ExportFormat, Id, MergeMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// apiworks - workspace bundle engine and sync server
#[derive(Parser, Debug)]
#[command(name = "apiworks")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (falls back to APIWORKS_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the redb store, overriding the configuration
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create a workspace owned by a user
    Init {
        #[arg(short, long)]
        name: String,

        /// Owning user ID
        #[arg(short, long)]
        user: Id,
    },

    /// Show entity counts of a workspace
    Status {
        #[arg(short, long)]
        workspace: Id,
    },

    /// Export a workspace bundle
    Export(ExportArgs),

    /// Import a bundle into a workspace
    Import(ImportArgs),

    /// Narrow a bundle file to the closure of some examples or flows
    Filter(FilterArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(short, long)]
    pub workspace: Id,

    #[arg(short, long)]
    pub output: PathBuf,

    /// yaml, json, zip or binary (default: from the output extension)
    #[arg(short = 't', long)]
    pub format: Option<ExportFormat>,

    /// Only these flows (comma-separated IDs)
    #[arg(long, value_delimiter = ',')]
    pub flows: Vec<Id>,

    /// Only these HTTP requests (comma-separated IDs)
    #[arg(long, value_delimiter = ',')]
    pub http: Vec<Id>,

    /// Only files under this folder
    #[arg(long)]
    pub folder: Option<Id>,

    #[arg(long)]
    pub no_http: bool,

    #[arg(long)]
    pub no_flows: bool,

    #[arg(long)]
    pub no_environments: bool,

    #[arg(long)]
    pub no_files: bool,

    /// Include credentials and their secrets
    #[arg(long)]
    pub credentials: bool,

    #[arg(long)]
    pub no_collections: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(short, long)]
    pub workspace: Id,

    #[arg(short, long)]
    pub input: PathBuf,

    /// yaml, json, zip or binary (default: from the input extension)
    #[arg(short = 't', long)]
    pub format: Option<ExportFormat>,

    #[arg(long)]
    pub preserve_ids: bool,

    /// skip, replace or create_new
    #[arg(long, default_value = "skip")]
    pub merge_mode: MergeMode,

    /// Keep only these examples and what they need
    #[arg(long, value_delimiter = ',', conflicts_with = "flows")]
    pub examples: Option<Vec<Id>>,

    /// Keep only these flows and what they need
    #[arg(long, value_delimiter = ',')]
    pub flows: Option<Vec<Id>>,

    /// Do not create folder entries for imported items
    #[arg(long)]
    pub no_files: bool,

    /// Give imported requests, flows and credentials without a file entry one
    #[arg(long, conflicts_with = "no_files")]
    pub synthesize_files: bool,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, value_delimiter = ',', conflicts_with = "flows", required_unless_present = "flows")]
    pub examples: Option<Vec<Id>>,

    #[arg(long, value_delimiter = ',')]
    pub flows: Option<Vec<Id>>,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.storage.path = database;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Server { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Commands::Init { name, user } => cmd_init(&config, json_mode, name, user),
        Commands::Status { workspace } => cmd_status(&config, json_mode, workspace),
        Commands::Export(args) => cmd_export(&config, json_mode, args).await,
        Commands::Import(args) => cmd_import(&config, json_mode, args).await,
        Commands::Filter(args) => cmd_filter(json_mode, &args),
    }
}
