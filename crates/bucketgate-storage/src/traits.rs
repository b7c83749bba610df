//! Object-storage client abstraction
//!
//! `BucketClient` is the narrow surface the operation adapters need from an
//! S3-compatible endpoint. One client is bound to one endpoint, credential pair,
//! region and addressing style.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Credential override rejected: {0}")]
    OverrideRejected(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Storage request timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    /// RFC 3339
    pub creation_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
    /// RFC 3339
    pub last_modified: Option<String>,
    pub etag: String,
}

/// One page of a ListObjectsV2 listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectInfo>,
    pub next_continuation_token: Option<String>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Client bound to a single object-storage endpoint.
///
/// Implementations never retry on their own; a failed call is reported once.
#[async_trait]
pub trait BucketClient: Send + Sync {
    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>>;

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Fails when the bucket still holds objects.
    async fn delete_bucket(&self, bucket: &str) -> StorageResult<()>;

    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> StorageResult<ObjectPage>;

    /// Signed GET URL valid for `expires_in`.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
        -> StorageResult<String>;

    /// Signed PUT URL valid for `expires_in`.
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<String>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Single-request upload. Returns the object's ETag when the backend reports one.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> StorageResult<Option<String>>;

    /// Starts a multipart upload and returns its upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> StorageResult<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<UploadedPart>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<Option<String>>;

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()>;
}
