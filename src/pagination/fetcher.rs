//! Page fetcher with retry, backoff and rate-limit handling
//!
//! Per call, up to `max_attempts` requests are made:
//! - 2xx: parse the page, then pace against the rate-limit headers
//! - 429: wait for the advertised reset (or back off when none is given)
//! - 5xx and transport errors: exponential backoff
//! - any other status: give up immediately
//!
//! Every wait races the cancellation token, so a stop request ends the wait
//! within a second and no further request is sent.

use super::types::{parse_page, FetchFailure, ListingEndpoint, Page, PageResult};
use crate::error::Result;
use crate::http::{
    countdown, interruptible_sleep, jitter, jitter_between, now_epoch, Countdown, HttpClient,
    RateLimitInfo,
};
use crate::records::DEFAULT_PROFILE_BASE;
use crate::types::CollectionTarget;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Retry and rate-limit tuning for page fetches
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Requests per logical fetch, including the first
    pub max_attempts: u32,
    /// Added to every reset-based wait
    pub reset_buffer: Duration,
    /// Floor for the wait after a 429 that carries a reset time
    pub min_rate_limit_wait: Duration,
    /// `remaining` at or below this (with a known reset) waits for the reset
    pub exhausted_threshold: u64,
    /// `remaining` at or below this adds a short jittered pause
    pub low_remaining_threshold: u64,
    /// Lower bound of the low-remaining pause
    pub low_remaining_pause_min: Duration,
    /// Upper bound of the low-remaining pause
    pub low_remaining_pause_max: Duration,
    /// Backoff for attempt `n` is `unit * 2^n`, capped at `max_backoff`
    pub backoff_unit: Duration,
    /// Cap on the exponential part of the backoff
    pub max_backoff: Duration,
    /// Random extra added to every backoff, in `[0, backoff_jitter)`
    pub backoff_jitter: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            reset_buffer: Duration::from_secs(2),
            min_rate_limit_wait: Duration::from_secs(5),
            exhausted_threshold: 1,
            low_remaining_threshold: 5,
            low_remaining_pause_min: Duration::from_secs(1),
            low_remaining_pause_max: Duration::from_secs(3),
            backoff_unit: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            backoff_jitter: Duration::from_millis(1200),
        }
    }
}

impl FetchPolicy {
    /// Create the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt ceiling
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the reset buffer and the post-429 floor
    #[must_use]
    pub fn with_rate_limit_waits(mut self, buffer: Duration, min_wait: Duration) -> Self {
        self.reset_buffer = buffer;
        self.min_rate_limit_wait = min_wait;
        self
    }

    /// Set the low-remaining pause range
    #[must_use]
    pub fn with_low_remaining_pause(mut self, min: Duration, max: Duration) -> Self {
        self.low_remaining_pause_min = min;
        self.low_remaining_pause_max = max;
        self
    }

    /// Set the backoff unit, cap and jitter
    #[must_use]
    pub fn with_backoff(mut self, unit: Duration, max: Duration, jitter: Duration) -> Self {
        self.backoff_unit = unit;
        self.max_backoff = max;
        self.backoff_jitter = jitter;
        self
    }

    /// Deterministic part of the backoff for 0-based `attempt`
    pub fn backoff_base(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_unit
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Full backoff for 0-based `attempt`, jitter included
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base(attempt) + jitter(self.backoff_jitter)
    }

    /// Wait after a 429 carrying `reset_in` seconds until the reset
    pub fn rate_limited_wait(&self, reset_in: u64) -> Duration {
        (Duration::from_secs(reset_in) + self.reset_buffer).max(self.min_rate_limit_wait)
    }
}

/// Fetches pages of one listing endpoint
#[derive(Debug)]
pub struct PageFetcher {
    client: HttpClient,
    endpoint: ListingEndpoint,
    policy: FetchPolicy,
    cancel: CancellationToken,
    profile_base: String,
}

impl PageFetcher {
    /// Create a fetcher; `cancel` is the process-wide stop signal
    pub fn new(client: HttpClient, endpoint: ListingEndpoint, cancel: CancellationToken) -> Self {
        Self {
            client,
            endpoint,
            policy: FetchPolicy::default(),
            cancel,
            profile_base: DEFAULT_PROFILE_BASE.to_string(),
        }
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the prefix used to derive profile URLs
    #[must_use]
    pub fn with_profile_base(mut self, base: impl Into<String>) -> Self {
        self.profile_base = base.into();
        self
    }

    /// Retry policy in use
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Endpoint in use
    pub fn endpoint(&self) -> &ListingEndpoint {
        &self.endpoint
    }

    /// The stop signal this fetcher honors
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch the page at `cursor` (first page when `None`)
    ///
    /// Recoverable problems are reported through [`PageResult`]. `Err` is
    /// reserved for failures that retrying cannot fix (signing, bad URL).
    pub async fn fetch_page(
        &self,
        target: &CollectionTarget,
        cursor: Option<&str>,
    ) -> Result<PageResult> {
        let url = self.endpoint.url_for(target)?;
        let max_attempts = self.policy.max_attempts;

        for attempt in 0..max_attempts {
            if self.cancel.is_cancelled() {
                info!("Stop requested; not sending request for target {}", target);
                return Ok(PageResult::Stopped);
            }

            let is_last_attempt = attempt + 1 == max_attempts;
            info!(
                "Fetching page for target {} (attempt {}/{})",
                target,
                attempt + 1,
                max_attempts
            );
            debug!("Cursor: {:?}", cursor);

            let response = match self
                .client
                .get_with_config(url.as_str(), self.endpoint.request_for(cursor))
                .await
            {
                Ok(response) => response,
                Err(e) if e.is_retryable() => {
                    warn!("Network error on attempt {}: {}", attempt + 1, e);
                    if !is_last_attempt && self.backoff(attempt).await.is_cancelled() {
                        return Ok(PageResult::Stopped);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = response.status;
            let rate_limit = response.rate_limit();
            debug!(
                "Status {} rate limit: remaining={}, reset={:?}",
                status, rate_limit.remaining, rate_limit.reset_epoch
            );

            if response.is_success() {
                let page = match parse_page(&response.body, &self.profile_base) {
                    Ok(page) => page,
                    Err(e) => {
                        error!("Unusable page body for target {}: {}", target, e);
                        return Ok(PageResult::Failed(FetchFailure::MalformedPage {
                            message: e.to_string(),
                        }));
                    }
                };
                info!(
                    "Fetched page with {} records (next cursor: {})",
                    page.records.len(),
                    if page.is_last() { "none" } else { "present" }
                );
                // A stop during pacing still hands back the received page
                self.pace(&rate_limit).await;
                return Ok(PageResult::Page(page));
            }

            if status == 429 {
                warn!("Rate limited (429) on attempt {}/{}", attempt + 1, max_attempts);
                if is_last_attempt {
                    continue;
                }
                let outcome = match rate_limit.seconds_until_reset(now_epoch()) {
                    Some(reset_in) => {
                        let wait = self.policy.rate_limited_wait(reset_in);
                        warn!(
                            "Server reset in {}s; waiting {}s before retrying",
                            reset_in,
                            wait.as_secs()
                        );
                        countdown(wait, &self.cancel, "rate-limit reset").await
                    }
                    None => {
                        warn!("No reset time in 429 response; using exponential backoff");
                        self.backoff(attempt).await
                    }
                };
                if outcome.is_cancelled() {
                    return Ok(PageResult::Stopped);
                }
                continue;
            }

            if (500..600).contains(&status) {
                warn!(
                    "Server error {} on attempt {}/{}: {}",
                    status,
                    attempt + 1,
                    max_attempts,
                    response.body_excerpt(200)
                );
                if !is_last_attempt && self.backoff(attempt).await.is_cancelled() {
                    return Ok(PageResult::Stopped);
                }
                continue;
            }

            error!("HTTP {}: {}", status, response.body_excerpt(500));
            return Ok(PageResult::Failed(FetchFailure::Rejected {
                status,
                body: response.body,
            }));
        }

        error!(
            "Too many retries for target {} ({} attempts)",
            target, max_attempts
        );
        Ok(PageResult::Failed(FetchFailure::RetriesExhausted {
            attempts: max_attempts,
        }))
    }

    /// Slow down according to the rate-limit headers of a successful response
    async fn pace(&self, info: &RateLimitInfo) {
        if info.is_exhausted(self.policy.exhausted_threshold) {
            let reset_in = info.seconds_until_reset(now_epoch()).unwrap_or(0);
            let wait = Duration::from_secs(reset_in) + self.policy.reset_buffer;
            info!(
                "Rate limit reached ({} remaining). Waiting {}s until reset...",
                info.remaining,
                wait.as_secs()
            );
            countdown(wait, &self.cancel, "rate-limit reset").await;
        } else if info.is_low(self.policy.low_remaining_threshold) {
            let delay = jitter_between(
                self.policy.low_remaining_pause_min,
                self.policy.low_remaining_pause_max,
            );
            info!(
                "Approaching rate limit ({} remaining). Waiting {:.1}s...",
                info.remaining,
                delay.as_secs_f64()
            );
            interruptible_sleep(delay, &self.cancel).await;
        }
    }

    async fn backoff(&self, attempt: u32) -> Countdown {
        let delay = self.policy.backoff_delay(attempt);
        warn!(
            "Backoff attempt {}, waiting {:.1}s...",
            attempt + 1,
            delay.as_secs_f64()
        );
        interruptible_sleep(delay, &self.cancel).await
    }
}

/// Convenience for callers that only care whether a page came back
impl PageResult {
    /// The page, if this result carries one
    pub fn into_page(self) -> Option<Page> {
        match self {
            PageResult::Page(page) => Some(page),
            _ => None,
        }
    }
}
