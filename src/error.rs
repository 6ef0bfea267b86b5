//! Error types for the likers collector
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Recoverable fetch problems (429, 5xx, rejected requests) are *not* errors:
//! the page fetcher reports them through [`crate::pagination::PageResult`].
//! Anything that surfaces as an [`Error`] is fatal for the current command.

use thiserror::Error;

/// The main error type for the collector
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    /// General configuration problem
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong
        message: String,
    },

    /// A required setting was not provided
    #[error("Missing required config field: {field}")]
    MissingConfigField {
        /// Name of the setting
        field: String,
    },

    /// A setting is out of range or malformed
    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue {
        /// Name of the setting
        field: String,
        /// Why the value was rejected
        message: String,
    },

    /// Config file is not valid YAML for the config schema
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON could not be parsed or produced
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    /// The request signer refused or failed
    #[error("Request signing failed: {message}")]
    Auth {
        /// Signer's explanation
        message: String,
    },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    /// Transport failure (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No response within the client timeout
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// API base or endpoint URL is invalid
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A response body did not have the expected shape
    #[error("Failed to decode page: {message}")]
    Decode {
        /// Parser's explanation
        message: String,
    },

    // ============================================================================
    // Storage Errors
    // ============================================================================
    /// DuckDB failure
    #[error("Storage error: {0}")]
    Storage(#[from] duckdb::Error),

    /// The database handle cannot be used
    #[error("Storage handle unavailable: {message}")]
    StorageHandle {
        /// Why the handle is unusable
        message: String,
    },

    // ============================================================================
    // Arrow/Parquet Errors
    // ============================================================================
    /// Arrow batch construction failed
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding failed
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Snapshot could not be encoded or delivered
    #[error("Output error: {message}")]
    Output {
        /// What went wrong
        message: String,
    },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    /// Error with added context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a storage handle error (poisoned lock, closed handle)
    pub fn storage_handle(message: impl Into<String>) -> Self {
        Self::StorageHandle {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Whether this error is a startup/configuration problem
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::YamlParse(_)
        )
    }

    /// Transport-level failures that a later attempt may not hit
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout { .. })
    }
}

/// Result type alias for the collector
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
