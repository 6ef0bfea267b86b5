//! CLI module
//!
//! Command-line interface for the collector.
//!
//! # Commands
//!
//! - `run` - Collect until done or stopped, then write the final snapshot
//! - `status` - Print the checkpoint and stored record count
//! - `export` - Write a snapshot now
//! - `reset` - Clear the cursor and completion flag

mod commands;
mod runner;

pub use commands::{Cli, Commands, ExportArgs, OutputFormat};
pub use runner::{build_exporter, run_collection, RunReport, Runner};
