//! Object-storage upload boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Destination for a converted artifact in object storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    pub region: String,
    pub acl: String,
    pub access_key: String,
    pub access_secret: String,
}

/// Error returned by an upload collaborator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UploadError(pub String);

/// Storage collaborator invoked by a worker after a successful conversion.
///
/// Implementations are request-agnostic; per-request credentials travel in
/// the [`UploadTarget`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, bytes: &[u8], target: &UploadTarget) -> Result<(), UploadError>;
}

/// Placeholder used when no object storage is wired in. Jobs submitted with
/// an upload target fail loudly instead of silently dropping the artifact.
#[derive(Debug, Default)]
pub struct NullUploader;

#[async_trait]
impl Uploader for NullUploader {
    async fn upload(&self, _bytes: &[u8], target: &UploadTarget) -> Result<(), UploadError> {
        Err(UploadError(format!(
            "no uploader configured for bucket {:?}",
            target.bucket
        )))
    }
}
