//! Deduplicating record store
//!
//! Ingestion is insert-if-absent: for every record the store checks whether
//! `(target, record_id)` is already present and inserts only when it is not.
//! Existing rows are never updated.

use super::types::Record;
use crate::database::Database;
use crate::error::Result;
use crate::types::CollectionTarget;
use duckdb::{params, Connection, Row};
use std::collections::VecDeque;

/// Rows fetched per query while listing
const DEFAULT_LIST_BATCH: usize = 500;

const SELECT_COLUMNS: &str =
    "record_id, username, name, verified, created_at, description, profile_url, metrics_json";

/// Durable store of collected records
#[derive(Debug, Clone)]
pub struct RecordStore {
    db: Database,
    list_batch: usize,
}

impl RecordStore {
    /// Create a record store on a database handle
    pub fn new(db: Database) -> Self {
        Self {
            db,
            list_batch: DEFAULT_LIST_BATCH,
        }
    }

    /// Set how many rows `list_ordered` pulls per query
    #[must_use]
    pub fn with_list_batch(mut self, size: usize) -> Self {
        self.list_batch = size.max(1);
        self
    }

    /// The database handle this store reads and writes through
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert every record whose id is not yet stored for `target`
    ///
    /// Duplicates (already stored, or repeated within `records`) are skipped.
    /// All inserts commit together. Returns the number of new rows.
    pub fn insert_many(&self, target: &CollectionTarget, records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let inserted = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0u64;
            for record in records {
                if contains(&tx, target, &record.record_id)? {
                    continue;
                }
                tx.execute(
                    "INSERT INTO records
                     (target_id, record_id, username, name, verified, created_at,
                      description, profile_url, metrics_json)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        target.as_str(),
                        record.record_id,
                        record.username,
                        record.name,
                        record.verified,
                        record.created_at,
                        record.description,
                        record.profile_url,
                        record.metrics_json,
                    ],
                )?;
                inserted += 1;
            }
            tx.commit()?;
            Ok(inserted)
        })?;

        let skipped = records.len() as u64 - inserted;
        if skipped > 0 {
            tracing::debug!(
                "Skipped {} already-stored records for target {}",
                skipped,
                target
            );
        }
        Ok(inserted)
    }

    /// Number of stored records for `target`
    pub fn count(&self, target: &CollectionTarget) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE target_id = ?",
                params![target.as_str()],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    /// Whether `record_id` is stored for `target`
    pub fn contains(&self, target: &CollectionTarget, record_id: &str) -> Result<bool> {
        self.db.with_conn(|conn| contains(conn, target, record_id))
    }

    /// Lazily iterate the target's records in ascending record-id order
    ///
    /// Each call starts a fresh pass over the data.
    pub fn list_ordered(&self, target: &CollectionTarget) -> OrderedRecords<'_> {
        OrderedRecords {
            store: self,
            target: target.clone(),
            last_id: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Fetch the next batch strictly after `after` (keyset pagination)
    fn fetch_after(&self, target: &CollectionTarget, after: Option<&str>) -> Result<Vec<Record>> {
        let limit = self.list_batch;
        self.db.with_conn(|conn| {
            let rows = match after {
                Some(last) => {
                    let sql = format!(
                        "SELECT {SELECT_COLUMNS} FROM records
                         WHERE target_id = ? AND record_id > ?
                         ORDER BY record_id LIMIT {limit}"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params![target.as_str(), last], row_to_record)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let sql = format!(
                        "SELECT {SELECT_COLUMNS} FROM records
                         WHERE target_id = ?
                         ORDER BY record_id LIMIT {limit}"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params![target.as_str()], row_to_record)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
    }
}

fn contains(conn: &Connection, target: &CollectionTarget, record_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE target_id = ? AND record_id = ?",
        params![target.as_str(), record_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn row_to_record(row: &Row<'_>) -> duckdb::Result<Record> {
    Ok(Record {
        record_id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        verified: row.get(3)?,
        created_at: row.get(4)?,
        description: row.get(5)?,
        profile_url: row.get(6)?,
        metrics_json: row.get(7)?,
    })
}

/// Lazy, ordered pass over one target's records
///
/// Yields `Err` at most once; iteration ends after an error.
pub struct OrderedRecords<'a> {
    store: &'a RecordStore,
    target: CollectionTarget,
    last_id: Option<String>,
    buffer: VecDeque<Record>,
    exhausted: bool,
}

impl Iterator for OrderedRecords<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self
                .store
                .fetch_after(&self.target, self.last_id.as_deref())
            {
                Ok(batch) => {
                    if batch.len() < self.store.list_batch {
                        self.exhausted = true;
                    }
                    self.buffer.extend(batch);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }

        let record = self.buffer.pop_front()?;
        self.last_id = Some(record.record_id.clone());
        Some(Ok(record))
    }
}

impl std::fmt::Debug for OrderedRecords<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedRecords")
            .field("target", &self.target)
            .field("last_id", &self.last_id)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
