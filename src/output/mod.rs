//! Output module
//!
//! Handles snapshot encoding and delivery.
//!
//! # Overview
//!
//! This module provides:
//! - `SnapshotExporter` - Ordered read, encode, write, stamp export time
//! - CSV and Parquet encoders over a fixed column set
//! - Destinations on the local filesystem or object storage (S3, R2, GCS, Azure)
//! - A periodic export task running on an independent database handle

mod cloud;
mod schedule;
mod schema;
mod snapshot;
mod writer;

pub use cloud::{CloudDestination, SharedSink, SnapshotSink};
pub use schedule::spawn_periodic_export;
pub use schema::{records_to_arrow, snapshot_columns, snapshot_schema};
pub use snapshot::{snapshot_name, SnapshotExporter, DEFAULT_RESOURCE};
pub use writer::{encode_csv, encode_parquet, encode_snapshot, ParquetWriterConfig};
