// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # likers-collector
//!
//! Resumable, rate-limit aware collection of a paginated "liking users"
//! listing into DuckDB, with CSV or Parquet snapshots.
//!
//! ## Features
//!
//! - **Resumable**: a durable checkpoint (cursor, completion flag, count) per target
//! - **Deduplicated**: records are keyed by (target, record id); re-ingesting is a no-op
//! - **Rate-limit aware**: waits for the advertised reset, backs off on 5xx and network errors
//! - **Prompt stop**: every wait races a cancellation token
//! - **Snapshots**: final or periodic exports to a local directory or object storage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use likers_collector::{cli::run_collection, config::CollectorConfig, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = CollectorConfig::from_yaml(
//!         "target_id: \"42\"\nbearer_token: \"...\"\nexport:\n  destination: out\n",
//!     )?;
//!
//!     let report = run_collection(&config, CancellationToken::new()).await?;
//!     println!("{} records, halted: {}", report.outcome.record_count(), report.outcome.halt);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Collector (engine)                       │
//! │   checkpoint → fetch page → ingest → save checkpoint → repeat   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │  Pagination   │  Storage  │   Output    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Bearer   │ GET       │ Retry/backoff │ DuckDB    │ CSV         │
//! │ NoAuth   │ Timeout   │ 429 reset wait│ Checkpoint│ Parquet     │
//! │          │ Rate hdrs │ Stop handling │ Records   │ Object store│
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the collector
pub mod error;

/// Common types and type aliases
pub mod types;

/// Request signing
pub mod auth;

/// HTTP client and rate-limit handling
pub mod http;

/// Page fetching with retry and backoff
pub mod pagination;

/// DuckDB database handles
pub mod database;

/// Checkpoint persistence
pub mod state;

/// Deduplicated record storage
pub mod records;

/// Snapshot encoding and delivery
pub mod output;

/// Collection loop
pub mod engine;

/// Collector configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::CollectorConfig;
pub use engine::{CollectOutcome, Collector, HaltReason};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
