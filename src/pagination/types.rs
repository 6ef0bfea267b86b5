//! Page request and result types

use crate::error::{Error, Result};
use crate::http::RequestConfig;
use crate::records::Record;
use crate::types::{CollectionTarget, JsonValue};
use serde::Deserialize;
use url::Url;

/// User fields requested with every page
pub const DEFAULT_USER_FIELDS: &str =
    "id,name,username,verified,created_at,description,public_metrics";

/// Where and how to request pages of liking users
#[derive(Debug, Clone)]
pub struct ListingEndpoint {
    api_base: Url,
    page_size: u32,
    user_fields: String,
}

impl ListingEndpoint {
    /// Endpoint rooted at `api_base` (e.g. `https://api.twitter.com/2`)
    pub fn new(api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base)?;
        if api_base.cannot_be_a_base() {
            return Err(Error::invalid_value("api_base", "URL cannot be a base"));
        }
        Ok(Self {
            api_base,
            page_size: 100,
            user_fields: DEFAULT_USER_FIELDS.to_string(),
        })
    }

    /// Set `max_results`
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the requested user fields
    #[must_use]
    pub fn with_user_fields(mut self, fields: impl Into<String>) -> Self {
        self.user_fields = fields.into();
        self
    }

    /// Page size sent as `max_results`
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// `{api_base}/tweets/{target}/liking_users`
    pub fn url_for(&self, target: &CollectionTarget) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::invalid_value("api_base", "URL cannot be a base"))?
            .pop_if_empty()
            .extend(["tweets", target.as_str(), "liking_users"]);
        Ok(url)
    }

    /// Query parameters for the page at `cursor` (first page when `None`)
    pub fn request_for(&self, cursor: Option<&str>) -> RequestConfig {
        let mut config = RequestConfig::new()
            .query("user.fields", &self.user_fields)
            .query("max_results", self.page_size.to_string());
        if let Some(token) = cursor {
            config = config.query("pagination_token", token);
        }
        config
    }
}

/// One page of the listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Usable records, in payload order
    pub records: Vec<Record>,
    /// Token for the following page; `None` on the last page
    pub next_cursor: Option<String>,
    /// Objects in the payload's `data` array, including unusable ones
    pub raw_count: usize,
}

impl Page {
    /// Whether this is the final page
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Why a fetch gave up for good
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// A non-retryable status (4xx other than 429)
    #[error("request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Every attempt ended in a retryable failure
    #[error("gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// A successful status with a body that is not a page
    #[error("malformed page: {message}")]
    MalformedPage { message: String },
}

/// Outcome of one logical page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResult {
    /// The page was received
    Page(Page),
    /// A stop was requested; checkpoint and halt
    Stopped,
    /// Terminal failure for this target; checkpoint and halt
    Failed(FetchFailure),
}

#[derive(Deserialize)]
struct PagePayload {
    #[serde(default)]
    data: Option<Vec<JsonValue>>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Deserialize)]
struct PageMeta {
    #[serde(default)]
    next_token: Option<String>,
}

/// Parse a page body: `{data?: [...], meta?: {next_token?}}`
///
/// Objects without a usable `id` are dropped with a warning. An empty
/// `next_token` counts as absent.
pub fn parse_page(body: &str, profile_base: &str) -> Result<Page> {
    let payload: PagePayload =
        serde_json::from_str(body).map_err(|e| Error::decode(format!("invalid page body: {e}")))?;

    let data = payload.data.unwrap_or_default();
    let raw_count = data.len();
    let mut records = Vec::with_capacity(raw_count);
    for value in &data {
        match Record::from_json(value, profile_base) {
            Some(record) => records.push(record),
            None => tracing::warn!("Skipping record without usable id: {}", value),
        }
    }

    let next_cursor = payload
        .meta
        .and_then(|m| m.next_token)
        .filter(|t| !t.is_empty());

    Ok(Page {
        records,
        next_cursor,
        raw_count,
    })
}
