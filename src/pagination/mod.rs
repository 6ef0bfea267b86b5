//! Page fetching
//!
//! Performs one logical page fetch against the listing endpoint, wrapped in
//! the retry / backoff / rate-limit state machine.
//!
//! # Overview
//!
//! - `ListingEndpoint` - URL and query parameters for a page request
//! - `FetchPolicy` - attempt ceiling, backoff and rate-limit tuning
//! - `PageFetcher` - issues requests and interprets statuses
//! - `PageResult` - a page, a stop, or a terminal fetch failure

mod fetcher;
mod types;

pub use fetcher::{FetchPolicy, PageFetcher};
pub use types::{parse_page, FetchFailure, ListingEndpoint, Page, PageResult, DEFAULT_USER_FIELDS};

#[cfg(test)]
mod tests;
