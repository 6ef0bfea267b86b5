//! Snapshot destinations (local directory, S3, R2, GCS, Azure)

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// Somewhere snapshot bytes can be written under a name
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Write `data` as `name`, replacing any previous object; returns its location
    async fn write(&self, name: &str, data: Bytes) -> Result<String>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Shared sink handle
pub type SharedSink = Arc<dyn SnapshotSink>;

/// Object store destination parsed from a URL or path
#[derive(Debug, Clone)]
pub struct CloudDestination {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Base path prefix within the bucket/container
    prefix: String,
    /// Original URL scheme for logging
    scheme: String,
    /// Bucket, container or local root, for logging
    root: String,
}

impl CloudDestination {
    /// Parse a destination URL and create appropriate object store
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `/local/path/`, `./path/` or `file:///path` - Local filesystem
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            Self::parse_s3(rest, "s3")
        } else if let Some(rest) = url.strip_prefix("r2://") {
            Self::parse_s3(rest, "r2")
        } else if let Some(rest) = url.strip_prefix("gs://") {
            Self::parse_gcs(rest)
        } else if let Some(rest) = url.strip_prefix("az://") {
            Self::parse_azure(rest)
        } else {
            Self::parse_local(url.strip_prefix("file://").unwrap_or(url))
        }
    }

    /// Parse S3 or R2 location (scheme already stripped)
    fn parse_s3(location: &str, scheme: &str) -> Result<Self> {
        let (bucket, prefix) = split_location(location, scheme)?;
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        // R2 endpoint: https://<account_id>.r2.cloudflarestorage.com
        if scheme == "r2" {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: scheme.to_string(),
            root: bucket.to_string(),
        })
    }

    /// Parse GCS location
    fn parse_gcs(location: &str) -> Result<Self> {
        let (bucket, prefix) = split_location(location, "gs")?;
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: "gs".to_string(),
            root: bucket.to_string(),
        })
    }

    /// Parse Azure Blob location
    fn parse_azure(location: &str) -> Result<Self> {
        let (container, prefix) = split_location(location, "az")?;
        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: "az".to_string(),
            root: container.to_string(),
        })
    }

    /// Parse local filesystem path, creating the directory if needed
    fn parse_local(path: &str) -> Result<Self> {
        let path = if path.is_empty() { "." } else { path };
        std::fs::create_dir_all(path)
            .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            scheme: "file".to_string(),
            root: path.trim_end_matches('/').to_string(),
        })
    }

    /// Check if this is a cloud destination (not local)
    pub fn is_cloud(&self) -> bool {
        self.scheme != "file"
    }

    /// Get the scheme (s3, r2, gs, az, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    fn object_path(&self, name: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(name)
        } else {
            ObjectPath::from(format!("{}/{name}", self.prefix.trim_end_matches('/')))
        }
    }
}

#[async_trait]
impl SnapshotSink for CloudDestination {
    async fn write(&self, name: &str, data: Bytes) -> Result<String> {
        let path = self.object_path(name);
        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| Error::output(format!("Failed to write {path}: {e}")))?;

        if self.is_cloud() {
            Ok(format!("{}://{}/{path}", self.scheme, self.root))
        } else {
            Ok(format!("{}/{path}", self.root))
        }
    }

    fn describe(&self) -> String {
        if self.is_cloud() {
            format!("{}://{}/{}", self.scheme, self.root, self.prefix)
        } else {
            self.root.clone()
        }
    }
}

/// Split `bucket/prefix/...` into bucket and prefix
fn split_location<'a>(location: &'a str, scheme: &str) -> Result<(&'a str, String)> {
    let (bucket, prefix) = match location.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix.trim_end_matches('/').to_string()),
        None => (location, String::new()),
    };
    if bucket.is_empty() {
        return Err(Error::config(format!(
            "Invalid {scheme} URL: missing bucket in {scheme}://{location}"
        )));
    }
    Ok((bucket, prefix))
}
