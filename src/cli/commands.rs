//! CLI commands and argument parsing

use crate::types::{ExportMode, SnapshotFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resumable collector for the users who liked a post
#[derive(Parser, Debug)]
#[command(name = "likers-collector")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Post to collect
    #[arg(short, long, global = true, env = "TARGET_ID")]
    pub target: Option<String>,

    /// DuckDB database file
    #[arg(long, global = true, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Output format for status reports
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Snapshot flags shared by `run` and `export`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Snapshot destination: local directory or s3://, r2://, gs://, az:// URL
    #[arg(short, long, env = "OUT_DIR")]
    pub output: Option<String>,

    /// Snapshot format
    #[arg(long)]
    pub snapshot_format: Option<SnapshotFormat>,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect until the listing is exhausted or a stop is requested
    Run {
        /// Bearer token for the remote API
        #[arg(long, env = "BEARER_TOKEN", hide_env_values = true)]
        bearer_token: Option<String>,

        /// API root URL
        #[arg(long)]
        api_base: Option<String>,

        /// When to write snapshots
        #[arg(long, env = "EXPORT_MODE")]
        export_mode: Option<ExportMode>,

        /// Seconds between periodic snapshots
        #[arg(long, env = "EXPORT_EVERY_SECS")]
        export_every_secs: Option<u64>,

        /// Stop after this many page fetches
        #[arg(long)]
        max_pages: Option<u32>,

        /// Expected total, enables the completion estimate
        #[arg(long)]
        expected_total: Option<u64>,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Show the checkpoint and record count
    Status,

    /// Write a snapshot of the collected records now
    Export {
        #[command(flatten)]
        export: ExportArgs,
    },

    /// Clear the cursor and completion flag so the target is collected again
    Reset,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one document per line)
    Json,
    /// Human-readable output
    Pretty,
}
