//! Periodic snapshot task
//!
//! Runs beside the collection loop on its own database connection and shares
//! nothing with it except the stop signal.

use super::snapshot::SnapshotExporter;
use crate::database::Database;
use crate::error::Result;
use crate::http::{interruptible_sleep, Countdown};
use crate::records::RecordStore;
use crate::types::CollectionTarget;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Start exporting `target` every `interval` until `cancel` fires
///
/// The task opens an independent handle on `db` up front, so a failure to do
/// so is reported here rather than inside the task. Export errors inside the
/// task are logged and the schedule continues.
pub fn spawn_periodic_export(
    exporter: SnapshotExporter,
    db: &Database,
    target: CollectionTarget,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<JoinHandle<u64>> {
    let handle = db.independent_handle()?;
    info!(
        "Periodic export every {}s to {}",
        interval.as_secs(),
        exporter.destination()
    );

    Ok(tokio::spawn(async move {
        let mut exports = 0u64;
        loop {
            if interruptible_sleep(interval, &cancel).await == Countdown::Cancelled {
                debug!("Periodic export stopping");
                break;
            }

            match RecordStore::new(handle.clone()).count(&target) {
                Ok(0) => debug!("No records yet; skipping periodic export"),
                Ok(_) => match exporter.export(&handle, &target).await {
                    Ok(location) => {
                        exports += 1;
                        info!("Periodic export written to {}", location);
                    }
                    Err(e) => error!("Periodic export failed: {}", e),
                },
                Err(e) => error!("Periodic export could not read records: {}", e),
            }
        }
        exports
    }))
}
