//! DuckDB-backed database handle
//!
//! DuckDB keeps a write-ahead log next to the database file, so every
//! committed transaction survives a crash. Rows written by one handle are
//! visible to every other handle on the same database once committed.

use crate::error::{Error, Result};
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Schema for checkpoints and collected records
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    target_id VARCHAR PRIMARY KEY,
    next_cursor VARCHAR,
    done BOOLEAN NOT NULL DEFAULT false,
    record_count BIGINT NOT NULL DEFAULT 0,
    last_request_time BIGINT,
    last_export_time BIGINT
);

CREATE TABLE IF NOT EXISTS records (
    target_id VARCHAR NOT NULL,
    record_id VARCHAR NOT NULL,
    username VARCHAR,
    name VARCHAR,
    verified BOOLEAN NOT NULL DEFAULT false,
    created_at VARCHAR,
    description VARCHAR NOT NULL DEFAULT '',
    profile_url VARCHAR NOT NULL DEFAULT '',
    metrics_json VARCHAR NOT NULL DEFAULT '{}',
    PRIMARY KEY (target_id, record_id)
);
";

/// Which side of the process a handle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleRole {
    /// Handle owned by the collection loop
    Primary,
    /// Separate connection for background readers
    Independent,
}

/// Handle to the collector database
///
/// Cloning shares the underlying connection (and role). Use
/// [`Database::independent_handle`] to get a separate connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    role: HandleRole,
    location: String,
}

impl Database {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, path.display().to_string())
    }

    /// Open a throwaway in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Database ready at {}", location);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            role: HandleRole::Primary,
            location,
        })
    }

    /// Open a second connection to the same database
    pub fn independent_handle(&self) -> Result<Self> {
        let cloned = self.with_conn(|conn| Ok(conn.try_clone()?))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(cloned)),
            role: HandleRole::Independent,
            location: self.location.clone(),
        })
    }

    /// Role of this handle
    pub fn role(&self) -> HandleRole {
        self.role
    }

    /// Whether this is the collection loop's handle
    pub fn is_primary(&self) -> bool {
        self.role == HandleRole::Primary
    }

    /// Where the database lives (file path or `:memory:`)
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Fold the write-ahead log into the main database file
    pub fn checkpoint_wal(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch("CHECKPOINT;")?;
            Ok(())
        })
    }

    /// Run `f` with exclusive access to this handle's connection
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| Error::storage_handle("connection lock poisoned"))?;
        f(&mut guard)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}
