//! Collection engine module
//!
//! Main collection loop: load the checkpoint, fetch a page, ingest it, save
//! the checkpoint, repeat until the listing is exhausted or the run halts.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Collector` - Drives one target to completion with checkpointing
//! - `CollectConfig` - Politeness delay, page ceiling and estimate settings
//! - `CollectOutcome` / `HaltReason` - Why and where a run stopped
//!
//! Records are committed before the checkpoint that points past them, so a
//! crash between the two refetches at most one page, which deduplicates.

mod types;

pub use types::{CollectConfig, CollectOutcome, CollectStats, CompletionEstimate, HaltReason};

use crate::error::Result;
use crate::http::interruptible_sleep;
use crate::pagination::{PageFetcher, PageResult};
use crate::records::RecordStore;
use crate::state::{Checkpoint, StateManager};
use crate::types::CollectionTarget;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Collection loop for one target at a time
pub struct Collector {
    /// Page fetcher, carrying the stop signal
    fetcher: PageFetcher,
    /// Checkpoint store
    state: StateManager,
    /// Record store
    records: RecordStore,
    /// Run configuration
    config: CollectConfig,
    /// Statistics
    stats: CollectStats,
}

impl Collector {
    /// Create a new collector
    pub fn new(fetcher: PageFetcher, state: StateManager, records: RecordStore) -> Self {
        Self {
            fetcher,
            state,
            records,
            config: CollectConfig::default(),
            stats: CollectStats::default(),
        }
    }

    /// Set run configuration
    #[must_use]
    pub fn with_config(mut self, config: CollectConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the record store
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Get statistics of the last run
    pub fn stats(&self) -> &CollectStats {
        &self.stats
    }

    /// Collect `target` from its checkpoint until done, stopped or failed
    ///
    /// Fetch failures and stop requests are normal halts, not errors. `Err`
    /// means storage failed or a request could not be built.
    pub async fn collect(&mut self, target: &CollectionTarget) -> Result<CollectOutcome> {
        let start = Instant::now();
        self.stats = CollectStats::default();

        let checkpoint = self.state.get(target)?;
        if checkpoint.done {
            info!(
                "Target {} already completed ({} records)",
                target, checkpoint.record_count
            );
            return Ok(self.finish(HaltReason::AlreadyDone, checkpoint, start));
        }

        let mut cursor = checkpoint.resume_cursor().map(str::to_string);
        let mut record_count = checkpoint.record_count;
        if checkpoint.is_fresh() {
            info!("Starting collection for target {}", target);
        } else {
            info!(
                "Resuming target {} with {} records collected",
                target, record_count
            );
        }

        let cancel = self.fetcher.cancel_token().clone();
        let mut pages_this_run: u32 = 0;

        let halt = loop {
            if cancel.is_cancelled() {
                break HaltReason::Interrupted;
            }
            if let Some(max) = self.config.max_pages {
                if pages_this_run >= max {
                    break HaltReason::PageLimit;
                }
            }

            pages_this_run += 1;
            info!("Processing page {}", pages_this_run);
            debug!("Current cursor: {:?}", cursor);

            match self.fetcher.fetch_page(target, cursor.as_deref()).await? {
                PageResult::Page(page) => {
                    let received = page.records.len();
                    let inserted = self.records.insert_many(target, &page.records)?;
                    record_count = self.records.count(target)?;
                    self.stats.add_page(received, inserted);

                    if received == 0 {
                        info!("No records in this page");
                    } else {
                        info!(
                            "Found {} records, {} new (total: {})",
                            received, inserted, record_count
                        );
                    }

                    cursor = page.next_cursor;
                    let done = cursor.is_none();
                    self.state
                        .save(target, cursor.as_deref(), done, record_count)?;

                    if done {
                        break HaltReason::Done;
                    }

                    self.log_estimate(record_count);

                    if interruptible_sleep(self.config.politeness_delay, &cancel)
                        .await
                        .is_cancelled()
                    {
                        break HaltReason::Interrupted;
                    }
                }
                PageResult::Stopped => {
                    info!("Stop requested; saving checkpoint");
                    self.state
                        .save(target, cursor.as_deref(), false, record_count)?;
                    break HaltReason::Interrupted;
                }
                PageResult::Failed(failure) => {
                    error!("Failed to fetch page for target {}: {}", target, failure);
                    self.state
                        .save(target, cursor.as_deref(), false, record_count)?;
                    break HaltReason::Failed(failure);
                }
            }
        };

        match &halt {
            HaltReason::Done => info!(
                "Collection complete for target {}: {} records",
                target, record_count
            ),
            HaltReason::PageLimit => warn!(
                "Reached page limit ({}) for target {}",
                pages_this_run, target
            ),
            HaltReason::Interrupted => info!("Stopped by signal"),
            _ => {}
        }

        let checkpoint = self.state.get(target)?;
        Ok(self.finish(halt, checkpoint, start))
    }

    fn finish(
        &mut self,
        halt: HaltReason,
        checkpoint: Checkpoint,
        start: Instant,
    ) -> CollectOutcome {
        #[allow(clippy::cast_possible_truncation)]
        self.stats.set_duration(start.elapsed().as_millis() as u64);
        CollectOutcome {
            halt,
            stats: self.stats.clone(),
            checkpoint,
        }
    }

    fn log_estimate(&self, collected: u64) {
        let Some(expected) = self.config.expected_total else {
            return;
        };
        if let Some(estimate) = CompletionEstimate::compute(
            expected,
            collected,
            self.config.page_size,
            self.config.time_per_request,
        ) {
            info!("Estimated completion: {}", estimate);
        }
    }
}
