//! Record storage module
//!
//! Durable, deduplicating storage of collected records keyed by
//! (target, record id).
//!
//! # Overview
//!
//! - `Record` - one collected user, built from a remote JSON object
//! - `RecordStore` - insert-if-absent ingestion, counting, ordered listing
//! - `OrderedRecords` - lazy iterator over a target's records by record id

mod store;
mod types;

pub use store::{OrderedRecords, RecordStore};
pub use types::{Record, DEFAULT_PROFILE_BASE, RECORD_COLUMNS};

#[cfg(test)]
mod tests;
