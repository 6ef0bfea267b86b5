//! Engine types
//!
//! Configuration, halt reasons and statistics for the collection loop.

use crate::pagination::FetchFailure;
use crate::state::Checkpoint;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Configuration for a collection run
#[derive(Debug, Clone, PartialEq)]
pub struct CollectConfig {
    /// Pause between successful pages
    pub politeness_delay: Duration,
    /// Stop after this many fetches in one run
    pub max_pages: Option<u32>,
    /// Expected final record count, used only for the completion estimate
    pub expected_total: Option<u64>,
    /// Assumed wall time per request for the completion estimate
    pub time_per_request: Duration,
    /// Records per page for the completion estimate
    pub page_size: u32,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_secs(2),
            max_pages: None,
            expected_total: None,
            time_per_request: Duration::from_secs(15 * 60),
            page_size: 100,
        }
    }
}

impl CollectConfig {
    /// Create a new collect config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pause between pages
    #[must_use]
    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    /// Set the page ceiling
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Enable the completion estimate
    #[must_use]
    pub fn with_estimate(mut self, expected_total: u64, time_per_request: Duration) -> Self {
        self.expected_total = Some(expected_total);
        self.time_per_request = time_per_request;
        self
    }

    /// Set the page size assumed by the estimate
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Why a run halted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The last page was ingested during this run
    Done,
    /// The checkpoint was already complete; nothing was fetched
    AlreadyDone,
    /// A stop was requested
    Interrupted,
    /// A page fetch failed for good; the checkpoint keeps the last cursor
    Failed(FetchFailure),
    /// The page ceiling was reached
    PageLimit,
}

impl HaltReason {
    /// Whether the target is fully collected
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Done | Self::AlreadyDone)
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::AlreadyDone => write!(f, "already done"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Failed(failure) => write!(f, "failed: {failure}"),
            Self::PageLimit => write!(f, "page limit reached"),
        }
    }
}

/// Statistics from a collection run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    /// Successful page fetches
    pub pages_fetched: u64,
    /// Records received, including duplicates
    pub records_received: u64,
    /// Records newly inserted
    pub records_ingested: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl CollectStats {
    /// Record one ingested page
    pub fn add_page(&mut self, received: usize, inserted: u64) {
        self.pages_fetched += 1;
        self.records_received += received as u64;
        self.records_ingested += inserted;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Result of [`Collector::collect`](super::Collector::collect)
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    /// Why the run stopped
    pub halt: HaltReason,
    /// Run statistics
    pub stats: CollectStats,
    /// Checkpoint as persisted when the run stopped
    pub checkpoint: Checkpoint,
}

impl CollectOutcome {
    /// Stored records for the target
    pub fn record_count(&self) -> u64 {
        self.checkpoint.record_count
    }
}

/// Rough time-to-completion, always presented as an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEstimate {
    /// Requests still expected
    pub requests_remaining: u64,
    /// Expected remaining wall time
    pub remaining: Duration,
}

impl CompletionEstimate {
    /// Estimate the remaining time from the assumed total
    ///
    /// `None` while nothing has been collected, since there is no progress to
    /// extrapolate from.
    pub fn compute(
        expected_total: u64,
        collected: u64,
        page_size: u32,
        time_per_request: Duration,
    ) -> Option<Self> {
        if collected == 0 || page_size == 0 {
            return None;
        }
        let requests_remaining = expected_total.saturating_sub(collected) / u64::from(page_size) + 1;
        let remaining = time_per_request
            .checked_mul(u32::try_from(requests_remaining).unwrap_or(u32::MAX))
            .unwrap_or(Duration::MAX);
        Some(Self {
            requests_remaining,
            remaining,
        })
    }
}

impl fmt::Display for CompletionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.remaining.as_secs() / 60;
        if minutes < 60 {
            write!(f, "~{minutes} minutes (estimate)")
        } else {
            write!(f, "~{:.1} hours (estimate)", minutes as f64 / 60.0)
        }
    }
}
