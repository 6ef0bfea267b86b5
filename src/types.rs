//! Common types used throughout the collector
//!
//! This module contains shared type definitions, type aliases,
//! and small enums used across multiple modules.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

// ============================================================================
// Collection Target
// ============================================================================

/// Identifier of the entity whose listing is being collected (e.g. a post id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionTarget(String);

impl CollectionTarget {
    /// Create a target, rejecting empty identifiers
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(Error::missing_field("target"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

// ============================================================================
// Export Mode
// ============================================================================

/// When snapshots are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Export once after collection halts, time-stamped file name
    #[default]
    Final,
    /// Export on a timer to a stable `current` file name (plus once at the end)
    Periodic,
    /// Never write snapshots
    Off,
}

impl ExportMode {
    /// File name suffix used by this mode for a snapshot generated at `epoch`
    pub fn file_suffix(self, epoch: i64) -> String {
        match self {
            ExportMode::Periodic => "current".to_string(),
            ExportMode::Final | ExportMode::Off => epoch.to_string(),
        }
    }
}

// ============================================================================
// Snapshot Format
// ============================================================================

/// Serialization format for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// Apache Parquet, one row group
    Parquet,
}

impl SnapshotFormat {
    /// File extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Csv => "csv",
            SnapshotFormat::Parquet => "parquet",
        }
    }
}
