//! Checkpoint type for tracking collection progress

use crate::types::CollectionTarget;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Durable progress record for one collection target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    /// Target this checkpoint belongs to
    pub target: CollectionTarget,
    /// Pagination token for the next page (`None` before the first page)
    pub cursor: Option<String>,
    /// Whether the last page has been ingested
    pub done: bool,
    /// Number of distinct records stored for this target
    pub record_count: u64,
    /// When the checkpoint was last saved after a page result
    pub last_request_time: Option<DateTime<Utc>>,
    /// When a snapshot was last written from the primary handle
    pub last_export_time: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Create the default checkpoint for a target that was never collected
    pub fn new(target: CollectionTarget) -> Self {
        Self {
            target,
            cursor: None,
            done: false,
            record_count: 0,
            last_request_time: None,
            last_export_time: None,
        }
    }

    /// Cursor to resume from; a finished checkpoint has nothing to resume
    pub fn resume_cursor(&self) -> Option<&str> {
        if self.done {
            None
        } else {
            self.cursor.as_deref()
        }
    }

    /// Whether collection for this target has never fetched a page
    pub fn is_fresh(&self) -> bool {
        !self.done && self.cursor.is_none() && self.last_request_time.is_none()
    }
}

/// Convert stored epoch seconds into a UTC timestamp
pub(crate) fn from_epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> CollectionTarget {
        CollectionTarget::new("42").unwrap()
    }

    #[test]
    fn test_checkpoint_default() {
        let cp = Checkpoint::new(target());
        assert!(cp.cursor.is_none());
        assert!(!cp.done);
        assert_eq!(cp.record_count, 0);
        assert!(cp.is_fresh());
    }

    #[test]
    fn test_resume_cursor_ignored_when_done() {
        let mut cp = Checkpoint::new(target());
        cp.cursor = Some("stale".to_string());
        assert_eq!(cp.resume_cursor(), Some("stale"));

        cp.done = true;
        assert_eq!(cp.resume_cursor(), None);
        assert!(!cp.is_fresh());
    }

    #[test]
    fn test_from_epoch() {
        assert!(from_epoch(None).is_none());
        let ts = from_epoch(Some(1_700_000_000)).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_checkpoint_serializes() {
        let cp = Checkpoint::new(target());
        let json = serde_json::to_value(&cp).unwrap();
        assert_eq!(json["target"], "42");
        assert_eq!(json["done"], false);
        assert!(json["cursor"].is_null());
    }
}
