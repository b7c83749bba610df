//! Operation adapters
//!
//! The seven data-plane operations, each executed against a request-scoped
//! [`BucketClient`]. Required parameters are checked before any network call.

use crate::traits::{BucketClient, StorageError, StorageResult, UploadedPart};
use bucketgate_core::constants::{
    MAX_AGGREGATE_PAGES, MULTIPART_PART_SIZE, PRESIGNED_URL_EXPIRY, UNKNOWN_TOTAL_SIZE,
};
use bucketgate_core::models::storage::{
    BucketSummary, ListBucketsResponse, ListObjectsRequest, ListObjectsResponse, ObjectSummary,
    PresignedUrlResponse, SuccessResponse, UploadResponse,
};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

fn require<'a>(field: &str, value: &'a str) -> StorageResult<&'a str> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(value)
}

pub async fn list_buckets(client: &dyn BucketClient) -> StorageResult<ListBucketsResponse> {
    let buckets = client
        .list_buckets()
        .await?
        .into_iter()
        .map(|b| BucketSummary {
            name: b.name,
            creation_date: b.creation_date,
        })
        .collect();

    Ok(ListBucketsResponse { buckets })
}

pub async fn create_bucket(client: &dyn BucketClient, bucket: &str) -> StorageResult<SuccessResponse> {
    client.create_bucket(require("bucket", bucket)?).await?;
    Ok(SuccessResponse { success: true })
}

pub async fn delete_bucket(client: &dyn BucketClient, bucket: &str) -> StorageResult<SuccessResponse> {
    client.delete_bucket(require("bucket", bucket)?).await?;
    Ok(SuccessResponse { success: true })
}

/// List one page of objects plus the byte total of the whole bucket.
///
/// The total comes from the page itself when it already covers the entire
/// bucket; otherwise from a separate unscoped pass. That pass never fails the
/// call: upstream errors and oversized buckets yield [`UNKNOWN_TOTAL_SIZE`].
#[tracing::instrument(skip(client, request), fields(aws.s3.bucket = %request.bucket))]
pub async fn list_objects(
    client: &dyn BucketClient,
    request: &ListObjectsRequest,
) -> StorageResult<ListObjectsResponse> {
    let bucket = require("bucket", &request.bucket)?;
    let prefix = request.prefix.as_deref().filter(|p| !p.is_empty());
    let continuation_token = request
        .continuation_token
        .as_deref()
        .filter(|t| !t.is_empty());

    let page = client
        .list_objects_page(bucket, prefix, continuation_token, request.max_keys)
        .await?;

    let covers_bucket = prefix.is_none() && continuation_token.is_none() && !page.is_truncated;
    let total_size = if covers_bucket {
        page.objects.iter().map(|o| o.size).sum()
    } else {
        aggregate_bucket_size(client, bucket).await
    };

    Ok(ListObjectsResponse {
        objects: page
            .objects
            .into_iter()
            .map(|o| ObjectSummary {
                key: o.key,
                size: o.size,
                last_modified: o.last_modified,
                etag: o.etag,
            })
            .collect(),
        total_size,
        continuation_token: page.next_continuation_token,
        is_truncated: page.is_truncated,
    })
}

async fn aggregate_bucket_size(client: &dyn BucketClient, bucket: &str) -> i64 {
    let start = Instant::now();
    let mut total: i64 = 0;
    let mut token: Option<String> = None;

    for _ in 0..MAX_AGGREGATE_PAGES {
        let page = match client
            .list_objects_page(bucket, None, token.as_deref(), None)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, bucket = %bucket, "Bucket size aggregation failed");
                return UNKNOWN_TOTAL_SIZE;
            }
        };

        total = total.saturating_add(page.objects.iter().map(|o| o.size).sum());

        match page.next_continuation_token {
            Some(next) if page.is_truncated => token = Some(next),
            _ => {
                tracing::debug!(
                    bucket = %bucket,
                    size_bytes = total,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Bucket size aggregated"
                );
                return total;
            }
        }
    }

    tracing::warn!(
        bucket = %bucket,
        max_pages = MAX_AGGREGATE_PAGES,
        "Bucket too large to aggregate, reporting unknown size"
    );
    UNKNOWN_TOTAL_SIZE
}

pub async fn presign_get_object(
    client: &dyn BucketClient,
    bucket: &str,
    key: &str,
) -> StorageResult<PresignedUrlResponse> {
    let url = client
        .presign_get(require("bucket", bucket)?, require("key", key)?, PRESIGNED_URL_EXPIRY)
        .await?;

    Ok(PresignedUrlResponse {
        presigned_url: url,
        expires_in: PRESIGNED_URL_EXPIRY.as_secs(),
    })
}

pub async fn presign_put_object(
    client: &dyn BucketClient,
    bucket: &str,
    key: &str,
    content_type: Option<&str>,
) -> StorageResult<PresignedUrlResponse> {
    let url = client
        .presign_put(
            require("bucket", bucket)?,
            require("key", key)?,
            content_type.filter(|c| !c.is_empty()),
            PRESIGNED_URL_EXPIRY,
        )
        .await?;

    Ok(PresignedUrlResponse {
        presigned_url: url,
        expires_in: PRESIGNED_URL_EXPIRY.as_secs(),
    })
}

pub async fn delete_object(
    client: &dyn BucketClient,
    bucket: &str,
    key: &str,
) -> StorageResult<SuccessResponse> {
    client
        .delete_object(require("bucket", bucket)?, require("key", key)?)
        .await?;
    Ok(SuccessResponse { success: true })
}

/// Destination of a streamed upload.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    /// Size announced by the caller, checked against the bytes actually received.
    pub expected_size: Option<u64>,
}

/// An open multipart upload.
///
/// Dropping it before [`MultipartUpload::complete`] succeeds schedules an
/// abort on the current runtime, which covers request cancellation.
struct MultipartUpload {
    client: Arc<dyn BucketClient>,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Vec<UploadedPart>,
    finished: bool,
}

impl MultipartUpload {
    async fn start(client: &Arc<dyn BucketClient>, target: &UploadTarget) -> StorageResult<Self> {
        let upload_id = client
            .create_multipart_upload(&target.bucket, &target.key, target.content_type.as_deref())
            .await?;

        tracing::debug!(bucket = %target.bucket, key = %target.key, upload_id = %upload_id, "Multipart upload started");

        Ok(Self {
            client: client.clone(),
            bucket: target.bucket.clone(),
            key: target.key.clone(),
            upload_id,
            parts: Vec::new(),
            finished: false,
        })
    }

    async fn push(&mut self, body: Bytes) -> StorageResult<()> {
        let part_number = self.parts.len() as i32 + 1;
        let part = self
            .client
            .upload_part(&self.bucket, &self.key, &self.upload_id, part_number, body)
            .await?;
        self.parts.push(part);
        Ok(())
    }

    async fn complete(&mut self) -> StorageResult<Option<String>> {
        let etag = self
            .client
            .complete_multipart_upload(&self.bucket, &self.key, &self.upload_id, self.parts.clone())
            .await?;
        self.finished = true;
        Ok(etag)
    }

    async fn abort(mut self) {
        self.finished = true;
        if let Err(e) = self
            .client
            .abort_multipart_upload(&self.bucket, &self.key, &self.upload_id)
            .await
        {
            tracing::warn!(error = %e, upload_id = %self.upload_id, "Failed to abort multipart upload");
        }
    }
}

impl Drop for MultipartUpload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let client = self.client.clone();
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        let upload_id = std::mem::take(&mut self.upload_id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.abort_multipart_upload(&bucket, &key, &upload_id).await {
                        tracing::warn!(error = %e, upload_id = %upload_id, "Failed to abort cancelled multipart upload");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(upload_id = %upload_id, "No runtime left to abort cancelled multipart upload");
            }
        }
    }
}

/// Stream a request body into the bucket without holding the whole object.
///
/// Bodies that stay within one part go out as a single PUT. Larger bodies become
/// a multipart upload fed part by part as the buffer fills; the buffer never
/// holds more than one part plus one inbound chunk. On any failure the
/// multipart upload is aborted before the error is returned.
pub async fn upload_stream<S, E>(
    client: Arc<dyn BucketClient>,
    target: UploadTarget,
    body: S,
) -> StorageResult<UploadResponse>
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: Display + Send,
{
    require("bucket", &target.bucket)?;
    require("key", &target.key)?;

    let mut multipart: Option<MultipartUpload> = None;
    let result = drive_upload(&client, &target, body, &mut multipart).await;

    if result.is_err() {
        if let Some(upload) = multipart.take() {
            upload.abort().await;
        }
    }

    result
}

async fn drive_upload<S, E>(
    client: &Arc<dyn BucketClient>,
    target: &UploadTarget,
    mut body: S,
    multipart: &mut Option<MultipartUpload>,
) -> StorageResult<UploadResponse>
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: Display + Send,
{
    let start = Instant::now();
    let mut buffer = BytesMut::with_capacity(MULTIPART_PART_SIZE);
    let mut received: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            StorageError::InvalidRequest(format!("Failed to read upload body: {}", e))
        })?;

        received += chunk.len() as u64;
        if let Some(expected) = target.expected_size {
            if received > expected {
                return Err(size_mismatch(expected, received));
            }
        }

        buffer.extend_from_slice(&chunk);

        // Flush only while strictly more than a part is buffered so a body of
        // exactly one part still goes out as a single PUT.
        while buffer.len() > MULTIPART_PART_SIZE {
            let part = buffer.split_to(MULTIPART_PART_SIZE).freeze();
            if multipart.is_none() {
                *multipart = Some(MultipartUpload::start(client, target).await?);
            }
            if let Some(upload) = multipart.as_mut() {
                upload.push(part).await?;
            }
        }
    }

    if let Some(expected) = target.expected_size {
        if received != expected {
            return Err(size_mismatch(expected, received));
        }
    }

    let etag = match multipart {
        None => {
            client
                .put_object(
                    &target.bucket,
                    &target.key,
                    target.content_type.as_deref(),
                    buffer.freeze(),
                )
                .await?
        }
        Some(upload) => {
            if !buffer.is_empty() {
                upload.push(buffer.freeze()).await?;
            }
            let etag = upload.complete().await?;

            tracing::info!(
                bucket = %target.bucket,
                key = %target.key,
                size_bytes = received,
                parts = upload.parts.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 multipart stream upload successful"
            );
            etag
        }
    };

    Ok(UploadResponse {
        bucket: target.bucket.clone(),
        key: target.key.clone(),
        size: received,
        etag,
    })
}

fn size_mismatch(expected: u64, received: u64) -> StorageError {
    StorageError::InvalidRequest(format!(
        "fileSize {} does not match the {} bytes received",
        expected, received
    ))
}
