//! JSON request/response bodies of the `/api/{id}/s3/*` operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

/// Optional per-request object-storage credentials.
///
/// Only honoured for managed backends; both fields must be given together.
#[derive(Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFields {
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for CredentialFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFields")
            .field("key_id", &self.key_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct ListBucketsRequest {
    #[serde(flatten)]
    pub credentials: CredentialFields,
}

/// Body of create-bucket and delete-bucket.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct BucketRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Bucket must be between 1 and 255 characters"
    ))]
    pub bucket: String,
    #[serde(flatten)]
    pub credentials: CredentialFields,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Bucket must be between 1 and 255 characters"
    ))]
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 1000, message = "maxKeys must be between 1 and 1000"))]
    pub max_keys: Option<i32>,
    #[serde(flatten)]
    pub credentials: CredentialFields,
}

/// Body of get-object, put-object (presigned) and delete-object.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Bucket must be between 1 and 255 characters"
    ))]
    pub bucket: String,
    #[validate(length(
        min = 1,
        max = 1024,
        message = "Key must be between 1 and 1024 characters"
    ))]
    pub key: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(flatten)]
    pub credentials: CredentialFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    pub name: String,
    /// RFC 3339 creation timestamp, when the backend reports one
    pub creation_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListBucketsResponse {
    pub buckets: Vec<BucketSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    /// RFC 3339
    pub last_modified: Option<String>,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsResponse {
    pub objects: Vec<ObjectSummary>,
    /// Bytes stored in the whole bucket, or -1 when it could not be computed
    pub total_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResponse {
    pub presigned_url: String,
    /// Seconds until the URL stops working
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Result of a streamed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
}
