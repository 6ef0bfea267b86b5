//! Collector configuration
//!
//! All knobs of a collection run, loadable from YAML. Every section and field
//! has a default, so an empty document is a valid config; only the target and
//! the bearer token must come from somewhere (file, flag or environment).

use crate::engine::CollectConfig;
use crate::error::{Error, Result};
use crate::http::HttpClientConfig;
use crate::pagination::{FetchPolicy, ListingEndpoint, DEFAULT_USER_FIELDS};
use crate::records::DEFAULT_PROFILE_BASE;
use crate::types::{CollectionTarget, ExportMode, SnapshotFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete collector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// Post whose liking users are collected
    #[serde(default)]
    pub target_id: Option<String>,

    /// Bearer token for the remote API
    #[serde(default, skip_serializing)]
    pub bearer_token: Option<String>,

    /// Path of the DuckDB database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry and rate-limit settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Collection loop settings
    #[serde(default)]
    pub collect: CollectSettings,

    /// Snapshot settings
    #[serde(default)]
    pub export: ExportConfig,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("state.duckdb")
}

impl CollectorConfig {
    /// Load a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check that a run can start with this config
    pub fn validate(&self) -> Result<()> {
        self.target()?;
        match self.bearer_token.as_deref().map(str::trim) {
            None | Some("") => return Err(Error::missing_field("bearer_token")),
            Some(_) => {}
        }
        self.validate_settings()
    }

    /// Check value ranges, without requiring target or credentials
    pub fn validate_settings(&self) -> Result<()> {
        if !(1..=1000).contains(&self.api.page_size) {
            return Err(Error::invalid_value(
                "api.page_size",
                "must be between 1 and 1000",
            ));
        }
        if self.api.timeout_seconds == 0 {
            return Err(Error::invalid_value(
                "api.timeout_seconds",
                "must be positive",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.retry.low_remaining_pause_min_ms > self.retry.low_remaining_pause_max_ms {
            return Err(Error::invalid_value(
                "retry.low_remaining_pause_min_ms",
                "must not exceed low_remaining_pause_max_ms",
            ));
        }
        if self.export.mode == ExportMode::Periodic && self.export.every_seconds == 0 {
            return Err(Error::invalid_value(
                "export.every_seconds",
                "must be positive in periodic mode",
            ));
        }
        if self.export.resource.trim().is_empty() {
            return Err(Error::invalid_value("export.resource", "must not be empty"));
        }
        Ok(())
    }

    /// The configured target
    pub fn target(&self) -> Result<CollectionTarget> {
        match self.target_id.as_deref() {
            Some(id) if !id.trim().is_empty() => CollectionTarget::new(id),
            _ => Err(Error::missing_field("target_id")),
        }
    }

    /// HTTP client settings
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder =
            HttpClientConfig::builder().timeout(Duration::from_secs(self.api.timeout_seconds));
        if let Some(agent) = &self.api.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }

    /// Listing endpoint for page requests
    pub fn endpoint(&self) -> Result<ListingEndpoint> {
        Ok(ListingEndpoint::new(&self.api.base_url)?
            .with_page_size(self.api.page_size)
            .with_user_fields(&self.api.user_fields))
    }

    /// Retry policy for the page fetcher
    pub fn fetch_policy(&self) -> FetchPolicy {
        let retry = &self.retry;
        FetchPolicy {
            max_attempts: retry.max_attempts,
            reset_buffer: Duration::from_secs(retry.reset_buffer_seconds),
            min_rate_limit_wait: Duration::from_secs(retry.min_rate_limit_wait_seconds),
            exhausted_threshold: retry.exhausted_threshold,
            low_remaining_threshold: retry.low_remaining_threshold,
            low_remaining_pause_min: Duration::from_millis(retry.low_remaining_pause_min_ms),
            low_remaining_pause_max: Duration::from_millis(retry.low_remaining_pause_max_ms),
            backoff_unit: Duration::from_millis(retry.backoff_unit_ms),
            max_backoff: Duration::from_secs(retry.max_backoff_seconds),
            backoff_jitter: Duration::from_millis(retry.backoff_jitter_ms),
        }
    }

    /// Collection loop settings
    pub fn collect_config(&self) -> CollectConfig {
        let settings = &self.collect;
        let mut config = CollectConfig::new()
            .with_politeness_delay(Duration::from_millis(settings.politeness_delay_ms))
            .with_max_pages(settings.max_pages)
            .with_page_size(self.api.page_size);
        if let Some(expected) = settings.expected_total {
            config = config.with_estimate(
                expected,
                Duration::from_secs(settings.minutes_per_request * 60),
            );
        }
        config
    }
}

// ============================================================================
// API
// ============================================================================

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// API root, e.g. `https://api.twitter.com/2`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Records per page (`max_results`)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Requested user fields
    #[serde(default = "default_user_fields")]
    pub user_fields: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Prefix for derived profile URLs
    #[serde(default = "default_profile_base")]
    pub profile_base: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            user_fields: default_user_fields(),
            timeout_seconds: default_timeout(),
            user_agent: None,
            profile_base: default_profile_base(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.twitter.com/2".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_user_fields() -> String {
    DEFAULT_USER_FIELDS.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_profile_base() -> String {
    DEFAULT_PROFILE_BASE.to_string()
}

// ============================================================================
// Retry
// ============================================================================

/// Retry and rate-limit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Requests per page fetch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Added to every reset-based wait, in seconds
    #[serde(default = "default_reset_buffer")]
    pub reset_buffer_seconds: u64,

    /// Floor for the wait after a 429 with a reset time, in seconds
    #[serde(default = "default_min_rate_limit_wait")]
    pub min_rate_limit_wait_seconds: u64,

    /// Remaining calls at or below which a success waits for the reset
    #[serde(default = "default_exhausted_threshold")]
    pub exhausted_threshold: u64,

    /// Remaining calls at or below which a success pauses briefly
    #[serde(default = "default_low_remaining_threshold")]
    pub low_remaining_threshold: u64,

    /// Lower bound of the brief pause, in milliseconds
    #[serde(default = "default_low_pause_min")]
    pub low_remaining_pause_min_ms: u64,

    /// Upper bound of the brief pause, in milliseconds
    #[serde(default = "default_low_pause_max")]
    pub low_remaining_pause_max_ms: u64,

    /// Backoff unit, in milliseconds
    #[serde(default = "default_backoff_unit")]
    pub backoff_unit_ms: u64,

    /// Backoff cap, in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,

    /// Upper bound of the random backoff extra, in milliseconds
    #[serde(default = "default_backoff_jitter")]
    pub backoff_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            reset_buffer_seconds: default_reset_buffer(),
            min_rate_limit_wait_seconds: default_min_rate_limit_wait(),
            exhausted_threshold: default_exhausted_threshold(),
            low_remaining_threshold: default_low_remaining_threshold(),
            low_remaining_pause_min_ms: default_low_pause_min(),
            low_remaining_pause_max_ms: default_low_pause_max(),
            backoff_unit_ms: default_backoff_unit(),
            max_backoff_seconds: default_max_backoff(),
            backoff_jitter_ms: default_backoff_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    7
}

fn default_reset_buffer() -> u64 {
    2
}

fn default_min_rate_limit_wait() -> u64 {
    5
}

fn default_exhausted_threshold() -> u64 {
    1
}

fn default_low_remaining_threshold() -> u64 {
    5
}

fn default_low_pause_min() -> u64 {
    1000
}

fn default_low_pause_max() -> u64 {
    3000
}

fn default_backoff_unit() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    300
}

fn default_backoff_jitter() -> u64 {
    1200
}

// ============================================================================
// Collection Loop
// ============================================================================

/// Collection loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectSettings {
    /// Pause between pages, in milliseconds
    #[serde(default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Stop after this many page fetches in one run
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Expected total records; enables the completion estimate
    #[serde(default)]
    pub expected_total: Option<u64>,

    /// Assumed minutes per request for the completion estimate
    #[serde(default = "default_minutes_per_request")]
    pub minutes_per_request: u64,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            politeness_delay_ms: default_politeness_delay(),
            max_pages: None,
            expected_total: None,
            minutes_per_request: default_minutes_per_request(),
        }
    }
}

fn default_politeness_delay() -> u64 {
    2000
}

fn default_minutes_per_request() -> u64 {
    15
}

// ============================================================================
// Export
// ============================================================================

/// Snapshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// When snapshots are written
    #[serde(default)]
    pub mode: ExportMode,

    /// Interval of periodic exports, in seconds
    #[serde(default = "default_export_every")]
    pub every_seconds: u64,

    /// Snapshot format
    #[serde(default)]
    pub format: SnapshotFormat,

    /// Local directory or object store URL (`s3://`, `r2://`, `gs://`, `az://`)
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Resource label in snapshot names
    #[serde(default = "default_resource")]
    pub resource: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: ExportMode::default(),
            every_seconds: default_export_every(),
            format: SnapshotFormat::default(),
            destination: default_destination(),
            resource: default_resource(),
        }
    }
}

fn default_export_every() -> u64 {
    300
}

fn default_destination() -> String {
    ".".to_string()
}

fn default_resource() -> String {
    crate::output::DEFAULT_RESOURCE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_empty_document_is_default() {
        let config = CollectorConfig::from_yaml("").unwrap();
        assert_eq!(config.database_path, PathBuf::from("state.duckdb"));
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.export.mode, ExportMode::Final);
        assert_eq!(config.export.every_seconds, 300);
        assert_eq!(config.export.destination, ".");
        assert_eq!(config.fetch_policy(), FetchPolicy::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
target_id: "42"
bearer_token: secret
database_path: data/state.duckdb
api:
  base_url: "http://localhost:8080/2"
  page_size: 50
  timeout_seconds: 10
retry:
  max_attempts: 3
  reset_buffer_seconds: 0
collect:
  politeness_delay_ms: 0
  max_pages: 4
  expected_total: 800
export:
  mode: periodic
  every_seconds: 60
  format: parquet
  destination: "s3://bucket/likers/"
"#;

        let config = CollectorConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.target().unwrap().as_str(), "42");
        assert_eq!(config.api.page_size, 50);
        assert_eq!(config.export.format, SnapshotFormat::Parquet);

        let policy = config.fetch_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.reset_buffer, Duration::ZERO);

        let collect = config.collect_config();
        assert_eq!(collect.max_pages, Some(4));
        assert_eq!(collect.expected_total, Some(800));
        assert_eq!(collect.page_size, 50);
        assert_eq!(collect.time_per_request, Duration::from_secs(900));

        let endpoint = config.endpoint().unwrap();
        assert_eq!(endpoint.page_size(), 50);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(CollectorConfig::from_yaml("tweet: 1").is_err());
    }

    #[test]
    fn test_missing_target_and_token() {
        let config = CollectorConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target_id"));

        let config = CollectorConfig {
            target_id: Some("42".to_string()),
            bearer_token: Some("  ".to_string()),
            ..CollectorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bearer_token"));
    }

    #[test_case("api:\n  page_size: 0" ; "zero page size")]
    #[test_case("api:\n  timeout_seconds: 0" ; "zero timeout")]
    #[test_case("retry:\n  max_attempts: 0" ; "zero attempts")]
    #[test_case("retry:\n  low_remaining_pause_min_ms: 5000" ; "inverted pause range")]
    #[test_case("export:\n  mode: periodic\n  every_seconds: 0" ; "zero export interval")]
    fn test_invalid_settings(yaml: &str) {
        let config = CollectorConfig::from_yaml(yaml).unwrap();
        assert!(config.validate_settings().unwrap_err().is_config());
    }

    #[test]
    fn test_token_not_serialized() {
        let config = CollectorConfig {
            bearer_token: Some("secret".to_string()),
            ..CollectorConfig::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("secret"));
    }
}
