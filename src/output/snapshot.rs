//! Snapshot export
//!
//! Reads a target's records in record-id order, encodes them and hands the
//! bytes to a sink. Only the primary database handle stamps the export time
//! on the checkpoint; background exports read through an independent handle
//! and leave the checkpoint alone.

use super::cloud::SharedSink;
use super::writer::{encode_snapshot, ParquetWriterConfig};
use crate::database::Database;
use crate::error::{Result, ResultExt};
use crate::records::{Record, RecordStore};
use crate::state::StateManager;
use crate::types::{CollectionTarget, ExportMode, SnapshotFormat};
use chrono::Utc;
use tracing::{debug, info};

/// Resource label used in snapshot names when none is configured
pub const DEFAULT_RESOURCE: &str = "likers";

/// `{target}_{resource}_{suffix}.{extension}`
pub fn snapshot_name(
    target: &CollectionTarget,
    resource: &str,
    suffix: &str,
    format: SnapshotFormat,
) -> String {
    format!("{target}_{resource}_{suffix}.{}", format.extension())
}

/// Writes snapshots of collected records
#[derive(Clone)]
pub struct SnapshotExporter {
    sink: SharedSink,
    format: SnapshotFormat,
    mode: ExportMode,
    resource: String,
    parquet: ParquetWriterConfig,
}

impl SnapshotExporter {
    /// Exporter writing CSV, time-stamped names, to `sink`
    pub fn new(sink: SharedSink) -> Self {
        Self {
            sink,
            format: SnapshotFormat::default(),
            mode: ExportMode::Final,
            resource: DEFAULT_RESOURCE.to_string(),
            parquet: ParquetWriterConfig::default(),
        }
    }

    /// Set the snapshot format
    #[must_use]
    pub fn with_format(mut self, format: SnapshotFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the naming mode (`Periodic` writes to the stable `current` name)
    #[must_use]
    pub fn with_mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the resource label used in names
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Set Parquet writer options
    #[must_use]
    pub fn with_parquet_config(mut self, config: ParquetWriterConfig) -> Self {
        self.parquet = config;
        self
    }

    /// Snapshot format
    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Naming mode
    pub fn mode(&self) -> ExportMode {
        self.mode
    }

    /// Where snapshots go
    pub fn destination(&self) -> String {
        self.sink.describe()
    }

    /// Name the next snapshot of `target` would be written under
    pub fn name_for(&self, target: &CollectionTarget) -> String {
        let suffix = self.mode.file_suffix(Utc::now().timestamp());
        snapshot_name(target, &self.resource, &suffix, self.format)
    }

    /// Export all records of `target` read through `db`; returns the location
    pub async fn export(&self, db: &Database, target: &CollectionTarget) -> Result<String> {
        let records = RecordStore::new(db.clone())
            .list_ordered(target)
            .collect::<Result<Vec<Record>>>()
            .with_context(|| format!("Failed to read records of target {target}"))?;
        debug!(
            "Encoding {} records for target {} as {:?}",
            records.len(),
            target,
            self.format
        );

        let data = encode_snapshot(self.format, target, &records, &self.parquet)?;
        let name = self.name_for(target);
        let location = self.sink.write(&name, data).await?;

        if db.is_primary() {
            StateManager::new(db.clone()).mark_exported(target)?;
        }

        info!("Exported {} records to {}", records.len(), location);
        Ok(location)
    }
}

impl std::fmt::Debug for SnapshotExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotExporter")
            .field("sink", &self.sink.describe())
            .field("format", &self.format)
            .field("mode", &self.mode)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}
