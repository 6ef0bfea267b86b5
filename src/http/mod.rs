//! HTTP client module
//!
//! Provides a signed, single-shot HTTP client plus the rate-limit helpers the
//! page fetcher builds its retry policy on.
//!
//! # Features
//!
//! - **Signed requests**: every request passes through a `RequestSigner`
//! - **Raw responses**: status, headers and body are handed back untouched so
//!   the caller decides what is retryable
//! - **Rate-limit headers**: `x-rate-limit-remaining` / `x-rate-limit-reset`
//! - **Interruptible waits**: per-second countdowns that honor cancellation

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, HttpResponse, RequestConfig};
pub use rate_limit::{
    countdown, interruptible_sleep, jitter, jitter_between, now_epoch, Countdown, RateLimitInfo,
    REMAINING_HEADER, RESET_HEADER,
};

#[cfg(test)]
mod tests;
