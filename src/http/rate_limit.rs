//! Rate-limit header handling and interruptible waits
//!
//! The remote reports its budget through two headers:
//! `x-rate-limit-remaining` (calls left in the window) and
//! `x-rate-limit-reset` (epoch seconds when the window resets).
//! Waiting for the reset is exact; blind backoff is only the fallback when the
//! reset header is missing.

use chrono::Utc;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Calls left in the current window
pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";

/// Window reset time, epoch seconds
pub const RESET_HEADER: &str = "x-rate-limit-reset";

/// Rate-limit state reported by one response
///
/// A missing remaining header reads as 1 and a missing reset as unknown. If
/// either header is present but not numeric, both fall back to those values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Remaining calls in the window
    pub remaining: u64,
    /// Reset epoch seconds; a zero header counts as absent
    pub reset_epoch: Option<i64>,
}

impl Default for RateLimitInfo {
    fn default() -> Self {
        Self {
            remaining: 1,
            reset_epoch: None,
        }
    }
}

impl RateLimitInfo {
    /// Parse the rate-limit headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let parse = |name: &str| -> Option<Option<i64>> {
            match headers.get(name) {
                None => Some(None),
                Some(value) => value
                    .to_str()
                    .ok()
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .map(Some),
            }
        };

        match (parse(REMAINING_HEADER), parse(RESET_HEADER)) {
            (Some(remaining), Some(reset)) => Self {
                remaining: remaining.map_or(1, |n| u64::try_from(n).unwrap_or(0)),
                reset_epoch: reset.filter(|&t| t != 0),
            },
            _ => Self::default(),
        }
    }

    /// Seconds from `now_epoch` until the reset (zero if already past)
    pub fn seconds_until_reset(&self, now_epoch: i64) -> Option<u64> {
        self.reset_epoch
            .map(|reset| u64::try_from(reset.saturating_sub(now_epoch)).unwrap_or(0))
    }

    /// Whether the window is spent (`remaining <= threshold`) and a reset is known
    pub fn is_exhausted(&self, threshold: u64) -> bool {
        self.reset_epoch.is_some() && self.remaining <= threshold
    }

    /// Whether the window is close to spent (`remaining <= threshold`)
    pub fn is_low(&self, threshold: u64) -> bool {
        self.remaining <= threshold
    }
}

/// Current wall-clock time in epoch seconds
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// How an interruptible wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// The full duration elapsed
    Completed,
    /// The cancellation token fired first
    Cancelled,
}

impl Countdown {
    /// Whether the wait was cut short
    pub fn is_cancelled(self) -> bool {
        self == Countdown::Cancelled
    }
}

/// Wait `total`, one second at a time, stopping early on cancellation
///
/// Logs the remaining time every ten seconds and for each of the last five.
pub async fn countdown(total: Duration, cancel: &CancellationToken, reason: &str) -> Countdown {
    let deadline = Instant::now() + total;
    let mut last_logged = u64::MAX;

    loop {
        if cancel.is_cancelled() {
            info!("Stop requested during {}; ending wait", reason);
            return Countdown::Cancelled;
        }

        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Countdown::Completed;
        }

        let secs = left.as_secs_f64().ceil() as u64;
        if secs != last_logged && (secs % 10 == 0 || secs <= 5) {
            info!("{}: {} seconds remaining...", reason, secs);
            last_logged = secs;
        }

        let step = left.min(Duration::from_secs(1));
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Stop requested during {}; ending wait", reason);
                return Countdown::Cancelled;
            }
            () = tokio::time::sleep(step) => {}
        }
    }
}

/// Sleep for `duration` unless cancelled first
pub async fn interruptible_sleep(duration: Duration, cancel: &CancellationToken) -> Countdown {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Countdown::Cancelled
        } else {
            Countdown::Completed
        };
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Countdown::Cancelled,
        () = tokio::time::sleep(duration) => Countdown::Completed,
    }
}

/// Uniformly distributed delay in `[0, max)`
pub fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    max.mul_f64(rand::random::<f64>())
}

/// Uniformly distributed delay in `[low, high)`
pub fn jitter_between(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    low + jitter(high - low)
}
