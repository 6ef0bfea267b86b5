//! Record type and conversion from remote payload objects

use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use std::io;

/// Profile URL prefix used when none is configured
pub const DEFAULT_PROFILE_BASE: &str = "https://x.com/";

/// Stored record columns in their declared (snapshot) order
pub const RECORD_COLUMNS: [&str; 8] = [
    "record_id",
    "username",
    "name",
    "verified",
    "created_at",
    "description",
    "profile_url",
    "metrics_json",
];

/// A collected user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Remote identifier, unique per target
    pub record_id: String,
    /// Handle, if the remote returned one
    pub username: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Verification flag (absent counts as false)
    pub verified: bool,
    /// Account creation timestamp as sent by the remote
    pub created_at: Option<String>,
    /// Free-text bio (empty when absent)
    pub description: String,
    /// Derived from `username`
    pub profile_url: String,
    /// `public_metrics` object serialized as JSON (`{}` when absent)
    pub metrics_json: String,
}

impl Record {
    /// Build a record from one entry of the page's `data` array
    ///
    /// Returns `None` when the object has no usable `id`.
    pub fn from_json(value: &JsonValue, profile_base: &str) -> Option<Self> {
        let record_id = match value.get("id")? {
            JsonValue::String(s) if !s.trim().is_empty() => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            _ => return None,
        };

        let text = |field: &str| {
            value
                .get(field)
                .and_then(JsonValue::as_str)
                .map(ToString::to_string)
        };

        let username = text("username");
        let profile_url = profile_url_for(username.as_deref(), profile_base);
        let metrics = value
            .get("public_metrics")
            .filter(|m| !m.is_null())
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));

        Some(Self {
            record_id,
            name: text("name"),
            verified: value
                .get("verified")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            created_at: text("created_at"),
            description: text("description").unwrap_or_default(),
            profile_url,
            metrics_json: metrics_to_json(&metrics),
            username,
        })
    }
}

/// Serialize metrics in the remote's key order with `", "` and `": "` separators
pub fn metrics_to_json(metrics: &JsonValue) -> String {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
    if metrics.serialize(&mut ser).is_err() {
        return metrics.to_string();
    }
    String::from_utf8(out).unwrap_or_else(|_| metrics.to_string())
}

/// Compact output plus a space after every separator
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Profile URL for a username, empty when there is no username
pub fn profile_url_for(username: Option<&str>, profile_base: &str) -> String {
    match username {
        Some(name) if !name.is_empty() => format!("{profile_base}{name}"),
        _ => String::new(),
    }
}
