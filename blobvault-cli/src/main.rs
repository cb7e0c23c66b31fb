//! BlobVault CLI
//!
//! Command-line client for encrypted attachment transfers.
//!
//! # Commands
//! - `upload` - Encrypt and upload a file
//! - `download` - Download and decrypt a file
//! - `blob-upload` - Store a standalone blob
//! - `blob-download` - Fetch a standalone blob
//! - `config` - Show or edit configuration
//!
//! # Configuration
//! Config file: ~/.blobvault/config.toml

use anyhow::Result;
use blobvault_client::{config, TransferMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod markers;

use commands::blob::{BlobDownloadConfig, BlobUploadConfig};
use commands::config::ConfigAction;
use commands::download::DownloadConfig;
use commands::upload::UploadConfig;

#[derive(Parser)]
#[command(name = "blobvault")]
#[command(about = "Encrypted attachment transfer CLI")]
#[command(version)]
struct Cli {
    /// Service origin (overrides config file)
    #[arg(long, global = true, env = "BLOBVAULT_ORIGIN")]
    origin: Option<String>,

    /// Transfer mode: in-memory or native (overrides config file)
    #[arg(long, global = true)]
    mode: Option<TransferMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and upload a file as an attachment
    Upload {
        /// Path to the file
        path: PathBuf,

        /// Stream through the native file helper
        #[arg(long)]
        native: bool,

        /// Base64 session key (generated if omitted)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Download and decrypt an attachment
    Download {
        /// List id of the file entity
        #[arg(long)]
        file_list_id: String,

        /// Element id of the file entity
        #[arg(long)]
        file_id: String,

        /// File data id returned by upload
        #[arg(long)]
        file_data_id: String,

        /// Base64 session key
        #[arg(short, long)]
        key: String,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Stream through the native file helper
        #[arg(long)]
        native: bool,
    },

    /// Encrypt and store a standalone blob
    BlobUpload {
        /// Path to the file
        path: PathBuf,

        /// Group owning the target archive
        #[arg(long)]
        owner_group: String,

        /// Base64 session key (generated if omitted)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Fetch and decrypt a standalone blob
    BlobDownload {
        /// Archive holding the blob
        #[arg(long)]
        archive_id: String,

        /// Base64 blob id
        #[arg(long)]
        blob_id: String,

        /// Base64 session key
        #[arg(short, long)]
        key: String,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., server.origin, transfer.mode)
        key: String,
        /// Value to set
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration from ~/.blobvault/config.toml
    let mut cfg = config::load_config();

    // CLI args override config file
    if let Some(origin) = cli.origin {
        cfg.server.origin = origin;
    }
    if let Some(mode) = cli.mode {
        cfg.transfer.mode = mode;
    }

    match cli.command {
        Commands::Upload { path, native, key } => {
            commands::upload::run(&cfg, UploadConfig { path, native, key }).await?;
        }

        Commands::Download {
            file_list_id,
            file_id,
            file_data_id,
            key,
            output,
            native,
        } => {
            let config = DownloadConfig {
                file_list_id,
                file_id,
                file_data_id,
                key,
                output,
                native,
            };
            commands::download::run(&cfg, config).await?;
        }

        Commands::BlobUpload {
            path,
            owner_group,
            key,
        } => {
            let config = BlobUploadConfig {
                path,
                owner_group,
                key,
            };
            commands::blob::upload(&cfg, config).await?;
        }

        Commands::BlobDownload {
            archive_id,
            blob_id,
            key,
            output,
        } => {
            let config = BlobDownloadConfig {
                archive_id,
                blob_id,
                key,
                output,
            };
            commands::blob::download(&cfg, config).await?;
        }

        Commands::Config { command } => {
            let action = match command {
                None | Some(ConfigCommands::Show) => ConfigAction::Show,
                Some(ConfigCommands::Path) => ConfigAction::Path,
                Some(ConfigCommands::Init { force }) => ConfigAction::Init { force },
                Some(ConfigCommands::Set { key, value }) => ConfigAction::Set { key, value },
            };
            commands::config::run(action)?;
        }
    }

    Ok(())
}
