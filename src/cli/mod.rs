//! Command-line interface.

pub mod completions;
pub mod decrypt;
pub mod encrypt;
pub mod handle;
pub mod inspect;
pub mod local_key;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::Config;
use crate::core::kms::Keyring;
use crate::core::pipeline::Pipeline;
use crate::core::store;
use crate::error::Result;

/// s3seal - encrypt objects in place with KMS envelope encryption.
#[derive(Parser)]
#[command(
    name = "s3seal",
    about = "Encrypt-and-replace for object storage, driven by object-created events",
    version
)]
pub struct Cli {
    /// Config file (TOML). Defaults to $S3SEAL_CONFIG if set
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Process an S3 object-created event notification
    Handle {
        /// Event JSON file, or - for stdin
        #[arg(long, default_value = "-", value_name = "PATH")]
        event: String,
    },

    /// Encrypt one object and replace it with <key>.encrypted
    Encrypt {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },

    /// Decrypt an encrypted object
    Decrypt {
        /// Bucket name
        bucket: String,
        /// Encrypted object key (ending in .encrypted)
        key: String,
        /// Write plaintext here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Show the header of a local encrypted file
    Inspect {
        /// Encrypted file
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a master key file for local:<name> key references
    LocalKey {
        /// Where to write the key (refuses to overwrite)
        path: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Build the pipeline named by configuration.
pub(crate) async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let store = store::from_config(config).await?;
    let keyring = Keyring::from_config(config).await?;
    Ok(Pipeline::new(store, keyring, config.envelope.frame_size))
}

/// Execute a command.
///
/// # Errors
///
/// Returns error if the command fails. `handle` only fails when the event
/// cannot be read; configuration and per-object failures are logged.
pub async fn execute(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    let load = || Config::load(config_path.as_deref());

    match cli.command {
        Command::Handle { event } => handle::execute(load(), &event).await,
        Command::Encrypt { bucket, key } => encrypt::execute(&load()?, &bucket, &key).await,
        Command::Decrypt {
            bucket,
            key,
            output,
        } => decrypt::execute(&load()?, &bucket, &key, output.as_deref()).await,
        Command::Inspect { path, json } => inspect::execute(&path, json).await,
        Command::LocalKey { path } => local_key::execute(&path),
        Command::Completions { shell } => completions::execute(shell, &mut std::io::stdout()),
    }
}
