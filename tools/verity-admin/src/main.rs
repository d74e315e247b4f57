//! verity-admin: hash tree formatter and verifier
//!
//! Formats the hash tree for a data image, verifies an image against its
//! tree, and reports target status and metrics.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use verity_telemetry::{init_logging, TelemetryConfig};

/// verity-admin: Merkle hash-tree tooling for read-only block images
#[derive(Parser, Debug)]
#[command(name = "verity-admin")]
#[command(about = "Format and verify dm-verity style hash trees")]
pub struct Args {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "VERITY_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// Parameters shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct ImageArgs {
    /// Data image (file or block device)
    #[arg(long)]
    pub data: PathBuf,

    /// Hash image (file or block device)
    #[arg(long)]
    pub hash: PathBuf,

    /// JSON configuration; command-line values override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Format version (0 or 1)
    #[arg(long)]
    pub format_version: Option<u32>,

    /// Data block size in bytes
    #[arg(long)]
    pub data_block_size: Option<u32>,

    /// Hash block size in bytes
    #[arg(long)]
    pub hash_block_size: Option<u32>,

    /// Data blocks covered (default: whole data image)
    #[arg(long)]
    pub data_blocks: Option<u64>,

    /// First hash-image block of the tree
    #[arg(long)]
    pub hash_offset: Option<u64>,

    /// Digest algorithm
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Salt as hex, "-" for none
    #[arg(long)]
    pub salt: Option<String>,
}

/// Response to corruption during `verify`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Stop at the first corrupted block
    FailFast,
    /// Keep going and list every corrupted block
    Logging,
}

impl From<ModeArg> for commands::ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::FailFast => commands::ScanMode::FirstCorruption,
            ModeArg::Logging => commands::ScanMode::Exhaustive,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the hash tree and write it to the hash image
    Format {
        #[command(flatten)]
        image: ImageArgs,

        /// Write the resulting configuration (with root digest) here
        #[arg(long)]
        write_config: Option<PathBuf>,
    },

    /// Read every data block through the verifier
    Verify {
        #[command(flatten)]
        image: ImageArgs,

        /// Expected root digest as hex
        #[arg(long)]
        root: Option<String>,

        /// Corruption handling
        #[arg(long, value_enum, default_value = "logging")]
        mode: ModeArg,

        /// Blocks per request
        #[arg(long, default_value = "256")]
        batch: u64,
    },

    /// Print status and metrics after a full verification pass
    Status {
        #[command(flatten)]
        image: ImageArgs,

        /// Expected root digest as hex
        #[arg(long)]
        root: Option<String>,

        /// Print Prometheus text instead of JSON
        #[arg(long)]
        prometheus: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = TelemetryConfig::from_env().with_json_logs(args.json_logs);
    init_logging(&telemetry)?;

    match args.command {
        Command::Format {
            image,
            write_config,
        } => commands::format(&image, write_config.as_deref()),
        Command::Verify {
            image,
            root,
            mode,
            batch,
        } => {
            let report = commands::verify(&image, root.as_deref(), mode.into(), batch)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.clean() {
                anyhow::bail!("{} corrupted block(s) found", report.corrupted_blocks.len());
            }
            Ok(())
        }
        Command::Status {
            image,
            root,
            prometheus,
        } => commands::status(&image, root.as_deref(), prometheus),
    }
}
