//! Checkpoint persistence
//!
//! Provides transactional checkpoint reads and writes on the DuckDB database.

use super::types::{from_epoch, Checkpoint};
use crate::database::Database;
use crate::error::Result;
use crate::types::CollectionTarget;
use chrono::Utc;
use duckdb::{params, Connection};

/// State manager for loading and saving checkpoints
#[derive(Debug, Clone)]
pub struct StateManager {
    db: Database,
}

impl StateManager {
    /// Create a state manager on a database handle
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The database handle this manager writes through
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Load the checkpoint for `target`, creating the default row if missing
    pub fn get(&self, target: &CollectionTarget) -> Result<Checkpoint> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            if ensure_row(&tx, target)? {
                tracing::debug!("Initialized checkpoint for target {}", target);
            }
            let checkpoint = read_row(&tx, target)?;
            tx.commit()?;
            Ok(checkpoint)
        })
    }

    /// Overwrite cursor, completion flag and count; stamps `last_request_time`
    pub fn save(
        &self,
        target: &CollectionTarget,
        cursor: Option<&str>,
        done: bool,
        record_count: u64,
    ) -> Result<()> {
        let now = Utc::now().timestamp();
        let count = i64::try_from(record_count).unwrap_or(i64::MAX);

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            ensure_row(&tx, target)?;
            tx.execute(
                "UPDATE checkpoints
                 SET next_cursor = ?, done = ?, record_count = ?, last_request_time = ?
                 WHERE target_id = ?",
                params![cursor, done, count, now, target.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        tracing::debug!(
            "Saved checkpoint: target={}, cursor={:?}, done={}, records={}",
            target,
            cursor,
            done,
            record_count
        );
        Ok(())
    }

    /// Stamp `last_export_time` without touching anything else
    pub fn mark_exported(&self, target: &CollectionTarget) -> Result<()> {
        let now = Utc::now().timestamp();
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            ensure_row(&tx, target)?;
            tx.execute(
                "UPDATE checkpoints SET last_export_time = ? WHERE target_id = ?",
                params![now, target.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Administrative reset: forget the cursor and the completion flag
    ///
    /// The record count is set to `record_count` (normally the record store's
    /// current count) since stored records are kept.
    pub fn reset(&self, target: &CollectionTarget, record_count: u64) -> Result<Checkpoint> {
        let count = i64::try_from(record_count).unwrap_or(i64::MAX);
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            ensure_row(&tx, target)?;
            tx.execute(
                "UPDATE checkpoints SET next_cursor = NULL, done = false, record_count = ?
                 WHERE target_id = ?",
                params![count, target.as_str()],
            )?;
            let checkpoint = read_row(&tx, target)?;
            tx.commit()?;
            Ok(checkpoint)
        })
    }
}

/// Insert the default row if absent; returns whether a row was created
fn ensure_row(conn: &Connection, target: &CollectionTarget) -> Result<bool> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM checkpoints WHERE target_id = ?",
        params![target.as_str()],
        |row| row.get(0),
    )?;

    if existing > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO checkpoints (target_id, next_cursor, done, record_count)
         VALUES (?, NULL, false, 0)",
        params![target.as_str()],
    )?;
    Ok(true)
}

fn read_row(conn: &Connection, target: &CollectionTarget) -> Result<Checkpoint> {
    let checkpoint = conn.query_row(
        "SELECT next_cursor, done, record_count, last_request_time, last_export_time
         FROM checkpoints WHERE target_id = ?",
        params![target.as_str()],
        |row| {
            let record_count: i64 = row.get(2)?;
            Ok(Checkpoint {
                target: target.clone(),
                cursor: row.get(0)?,
                done: row.get(1)?,
                record_count: u64::try_from(record_count).unwrap_or(0),
                last_request_time: from_epoch(row.get(3)?),
                last_export_time: from_epoch(row.get(4)?),
            })
        },
    )?;
    Ok(checkpoint)
}
