//! State management module
//!
//! Handles the durable checkpoint that makes a collection resumable.
//!
//! # Overview
//!
//! The state module provides:
//! - `Checkpoint` - cursor, completion flag, running count and timestamps
//! - `StateManager` - DuckDB-backed get-or-create / save / mark-exported
//!
//! Every operation runs in its own transaction, so a reader on another
//! handle never observes a half-written checkpoint.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::Checkpoint;
