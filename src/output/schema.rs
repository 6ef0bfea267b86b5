//! Snapshot columns and Record to Arrow conversion
//!
//! Every snapshot, whatever its format, carries the same columns in the same
//! order: the target id followed by the stored record columns.

use crate::error::Result;
use crate::records::{Record, RECORD_COLUMNS};
use crate::types::CollectionTarget;
use arrow::array::{ArrayRef, BooleanArray, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Snapshot header, in column order
pub fn snapshot_columns() -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(RECORD_COLUMNS.len() + 1);
    columns.push("target_id");
    columns.extend(RECORD_COLUMNS);
    columns
}

/// Arrow schema of a snapshot
pub fn snapshot_schema() -> Schema {
    let fields: Vec<Field> = snapshot_columns()
        .into_iter()
        .map(|name| match name {
            "verified" => Field::new(name, DataType::Boolean, false),
            "username" | "name" | "created_at" => Field::new(name, DataType::Utf8, true),
            _ => Field::new(name, DataType::Utf8, false),
        })
        .collect();
    Schema::new(fields)
}

/// Convert records of one target into a single RecordBatch
pub fn records_to_arrow(target: &CollectionTarget, records: &[Record]) -> Result<RecordBatch> {
    let schema = Arc::new(snapshot_schema());

    let text = |f: fn(&Record) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(records.iter().map(f)))
    };
    let optional = |f: fn(&Record) -> Option<&str>| -> ArrayRef {
        Arc::new(records.iter().map(f).collect::<StringArray>())
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            std::iter::repeat(target.as_str()).take(records.len()),
        )),
        text(|r| r.record_id.as_str()),
        optional(|r| r.username.as_deref()),
        optional(|r| r.name.as_deref()),
        Arc::new(BooleanArray::from(
            records.iter().map(|r| r.verified).collect::<Vec<_>>(),
        )),
        optional(|r| r.created_at.as_deref()),
        text(|r| r.description.as_str()),
        text(|r| r.profile_url.as_str()),
        text(|r| r.metrics_json.as_str()),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}
