//! Blob store for uploaded photos.
//!
//! Objects are addressed by `(bucket, key)` and served publicly under
//! [`PUBLIC_OBJECT_PREFIX`].

mod local;

pub use local::*;

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::AppError;

/// URL path under which public objects are served.
pub const PUBLIC_OBJECT_PREFIX: &str = "/storage/v1/object/public";

/// Options for a single upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Replace an existing object at the same key instead of failing.
    pub overwrite: bool,
    pub content_type: Option<String>,
}

/// Object storage collaborator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`. Fails when the key exists and `overwrite` is off.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        options: UploadOptions,
    ) -> Result<(), AppError>;

    /// Public address of an object. Does not check that the object exists.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Remove objects. Missing keys are not an error.
    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), AppError>;
}

/// Storage key for an upload: `<micros-since-epoch>-<sanitized-file-name>`.
pub fn photo_key(file_name: &str) -> String {
    format!(
        "{}-{}",
        chrono::Utc::now().timestamp_micros(),
        sanitize_file_name(file_name)
    )
}

/// Reduce a client-supplied file name to one safe URL path segment.
pub fn sanitize_file_name(file_name: &str) -> String {
    // Browsers on Windows may send the full client path.
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Storage key of a public URL: its last path segment.
pub fn key_from_public_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|s| !s.is_empty())
}
