//! Durable storage via DuckDB
//!
//! One DuckDB database holds both the checkpoint table and the record table.
//! The collection loop works through the *primary* handle; background readers
//! (the periodic snapshot exporter) open an *independent* handle on the same
//! database so their reads never wait on the loop's write transactions.

mod engine;

pub use engine::{Database, HandleRole};
