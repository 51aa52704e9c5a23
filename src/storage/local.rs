//! Filesystem-backed blob store.
//!
//! Objects live at `<root>/<bucket>/<key>`; the HTTP layer serves `<root>` under
//! the public object prefix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{BlobStore, UploadOptions, PUBLIC_OBJECT_PREFIX};
use crate::errors::AppError;

/// Blob store writing objects to a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    /// Create the store, making sure the root directory exists.
    pub async fn open(root: &Path, public_url: &str) -> Result<Self, AppError> {
        fs::create_dir_all(root).await.map_err(|e| {
            AppError::Internal(format!(
                "Failed to create storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Directory served under the public object prefix.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, AppError> {
        if !is_single_segment(bucket) || !is_single_segment(key) {
            return Err(AppError::Validation(format!(
                "Invalid object address {}/{}",
                bucket, key
            )));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

fn is_single_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        options: UploadOptions,
    ) -> Result<(), AppError> {
        let path = self.object_path(bucket, key)?;
        let upload_err =
            |e: std::io::Error| AppError::Upload(format!("Failed to store {}/{}: {}", bucket, key, e));

        fs::create_dir_all(self.root.join(bucket))
            .await
            .map_err(upload_err)?;

        let mut open = fs::OpenOptions::new();
        open.write(true);
        if options.overwrite {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }

        let mut file = open.open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                AppError::Upload(format!("Object {}/{} already exists", bucket, key))
            } else {
                upload_err(e)
            }
        })?;

        file.write_all(&bytes).await.map_err(upload_err)?;
        file.flush().await.map_err(upload_err)?;

        tracing::debug!(
            bucket,
            key,
            size = bytes.len(),
            content_type = options.content_type.as_deref().unwrap_or("unknown"),
            "Stored object"
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}{}/{}/{}", self.public_url, PUBLIC_OBJECT_PREFIX, bucket, key)
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
        for key in keys {
            let path = self.object_path(bucket, key)?;
            match fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(bucket, key = %key, "Removed object"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Internal(format!(
                        "Failed to remove {}/{}: {}",
                        bucket, key, e
                    )))
                }
            }
        }
        Ok(())
    }
}
