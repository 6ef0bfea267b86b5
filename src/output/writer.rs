//! Snapshot encoders
//!
//! Serializes ordered records into snapshot bytes, either as CSV with a header
//! row or as a single-file Parquet document.

use super::schema::{records_to_arrow, snapshot_columns};
use crate::error::{Error, Result};
use crate::records::Record;
use crate::types::{CollectionTarget, SnapshotFormat};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Configuration for Parquet snapshots
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
    dictionary_enabled: bool,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024, // 1M rows
            dictionary_enabled: true,
        }
    }
}

impl ParquetWriterConfig {
    /// Create a new config with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression algorithm
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Enable or disable dictionary encoding
    #[must_use]
    pub fn with_dictionary(mut self, enabled: bool) -> Self {
        self.dictionary_enabled = enabled;
        self
    }

    /// Use no compression
    #[must_use]
    pub fn uncompressed(mut self) -> Self {
        self.compression = Compression::UNCOMPRESSED;
        self
    }

    fn build_properties(&self) -> WriterProperties {
        let mut builder = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_created_by(format!("likers-collector {}", env!("CARGO_PKG_VERSION")));

        if !self.dictionary_enabled {
            builder = builder.set_dictionary_enabled(false);
        }

        builder.build()
    }
}

/// Encode records in the given format
pub fn encode_snapshot(
    format: SnapshotFormat,
    target: &CollectionTarget,
    records: &[Record],
    parquet_config: &ParquetWriterConfig,
) -> Result<Bytes> {
    match format {
        SnapshotFormat::Csv => Ok(encode_csv(target, records)),
        SnapshotFormat::Parquet => encode_parquet(target, records, parquet_config),
    }
}

/// CSV with a header row; `verified` as `1`/`0`, absent values as empty cells
pub fn encode_csv(target: &CollectionTarget, records: &[Record]) -> Bytes {
    let mut out = String::new();
    push_row(&mut out, snapshot_columns().into_iter());

    for record in records {
        push_row(
            &mut out,
            [
                target.as_str(),
                record.record_id.as_str(),
                record.username.as_deref().unwrap_or(""),
                record.name.as_deref().unwrap_or(""),
                if record.verified { "1" } else { "0" },
                record.created_at.as_deref().unwrap_or(""),
                record.description.as_str(),
                record.profile_url.as_str(),
                record.metrics_json.as_str(),
            ]
            .into_iter(),
        );
    }

    Bytes::from(out)
}

/// Parquet document holding one RecordBatch
pub fn encode_parquet(
    target: &CollectionTarget,
    records: &[Record],
    config: &ParquetWriterConfig,
) -> Result<Bytes> {
    let batch = records_to_arrow(target, records)?;
    let mut buffer = Vec::new();

    let mut writer =
        ArrowWriter::try_new(&mut buffer, batch.schema(), Some(config.build_properties()))
            .map_err(|e| Error::output(format!("Failed to create Parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| Error::output(format!("Failed to write batch: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::output(format!("Failed to close Parquet writer: {e}")))?;

    Ok(Bytes::from(buffer))
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

/// Quote fields containing a delimiter, quote or line break
fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
