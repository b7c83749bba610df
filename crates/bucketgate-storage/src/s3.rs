use crate::traits::{
    BucketClient, BucketInfo, ObjectInfo, ObjectPage, StorageError, StorageResult, UploadedPart,
};
use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime, DateTimeFormat};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::time::{Duration, Instant};

/// Region that must not be sent as a location constraint.
const US_EAST_1: &str = "us-east-1";

/// S3 client bound to one tenant endpoint
#[derive(Clone)]
pub struct S3BucketClient {
    client: Client,
    region: String,
}

impl S3BucketClient {
    pub fn new(client: Client, region: String) -> Self {
        Self { client, region }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn rfc3339(value: Option<&DateTime>) -> Option<String> {
    value.and_then(|dt| dt.fmt(DateTimeFormat::DateTime).ok())
}

/// Flatten an SDK error, keeping timeouts distinguishable.
fn sdk_error<E, R>(err: SdkError<E, R>, wrap: fn(String) -> StorageError) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::TimeoutError(_) => StorageError::Timeout(message),
        _ => wrap(message),
    }
}

fn presigning(expires_in: Duration) -> StorageResult<PresigningConfig> {
    PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::ConfigError(e.to_string()))
}

#[async_trait]
impl BucketClient for S3BucketClient {
    #[tracing::instrument(skip(self), fields(aws.service.name = "s3"))]
    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>> {
        let start = Instant::now();

        let response = self.client.list_buckets().send().await.map_err(|e| {
            let err = sdk_error(e, StorageError::BackendError);
            tracing::error!(error = %err, duration_ms = elapsed_ms(start), "S3 list_buckets failed");
            err
        })?;

        let buckets: Vec<BucketInfo> = response
            .buckets()
            .iter()
            .filter_map(|bucket| {
                bucket.name().map(|name| BucketInfo {
                    name: name.to_string(),
                    creation_date: rfc3339(bucket.creation_date()),
                })
            })
            .collect();

        tracing::info!(
            count = buckets.len(),
            duration_ms = elapsed_ms(start),
            "S3 list_buckets successful"
        );

        Ok(buckets)
    }

    #[tracing::instrument(skip(self), fields(aws.service.name = "s3", aws.s3.bucket = %bucket))]
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let start = Instant::now();

        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != US_EAST_1 {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request.send().await.map_err(|e| {
            let err = sdk_error(e, StorageError::BackendError);
            tracing::error!(error = %err, bucket = %bucket, duration_ms = elapsed_ms(start), "S3 create_bucket failed");
            err
        })?;

        tracing::info!(bucket = %bucket, region = %self.region, duration_ms = elapsed_ms(start), "S3 create_bucket successful");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(aws.service.name = "s3", aws.s3.bucket = %bucket))]
    async fn delete_bucket(&self, bucket: &str) -> StorageResult<()> {
        let start = Instant::now();

        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                let err = sdk_error(e, StorageError::DeleteFailed);
                tracing::error!(error = %err, bucket = %bucket, duration_ms = elapsed_ms(start), "S3 delete_bucket failed");
                err
            })?;

        tracing::info!(bucket = %bucket, duration_ms = elapsed_ms(start), "S3 delete_bucket successful");
        Ok(())
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> StorageResult<ObjectPage> {
        let start = Instant::now();

        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(String::from))
            .set_continuation_token(continuation_token.map(String::from))
            .set_max_keys(max_keys)
            .send()
            .await
            .map_err(|e| {
                let err = sdk_error(e, StorageError::BackendError);
                tracing::error!(error = %err, bucket = %bucket, prefix = ?prefix, duration_ms = elapsed_ms(start), "S3 list_objects failed");
                err
            })?;

        let objects: Vec<ObjectInfo> = response
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0),
                    last_modified: rfc3339(object.last_modified()),
                    etag: object.e_tag().unwrap_or_default().to_string(),
                })
            })
            .collect();

        tracing::debug!(
            bucket = %bucket,
            count = objects.len(),
            duration_ms = elapsed_ms(start),
            "S3 list_objects successful"
        );

        Ok(ObjectPage {
            objects,
            next_continuation_token: response.next_continuation_token().map(String::from),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning(expires_in)?)
            .await
            .map_err(|e| sdk_error(e, StorageError::BackendError))?;

        Ok(presigned.uri().to_string())
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .presigned(presigning(expires_in)?)
            .await
            .map_err(|e| sdk_error(e, StorageError::BackendError))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(skip(self), fields(aws.service.name = "s3", aws.s3.bucket = %bucket, aws.s3.key = %key))]
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let start = Instant::now();

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = sdk_error(e, StorageError::DeleteFailed);
                tracing::error!(error = %err, bucket = %bucket, key = %key, duration_ms = elapsed_ms(start), "S3 delete failed");
                err
            })?;

        tracing::info!(bucket = %bucket, key = %key, duration_ms = elapsed_ms(start), "S3 delete successful");
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> StorageResult<Option<String>> {
        let start = Instant::now();
        let size = body.len() as u64;

        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                let err = sdk_error(e, StorageError::UploadFailed);
                tracing::error!(error = %err, bucket = %bucket, key = %key, size_bytes = size, duration_ms = elapsed_ms(start), "S3 upload failed");
                err
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = elapsed_ms(start),
            "S3 upload successful"
        );

        Ok(response.e_tag().map(String::from))
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| {
                let err = sdk_error(e, StorageError::UploadFailed);
                tracing::error!(error = %err, bucket = %bucket, key = %key, "Failed to create multipart upload");
                err
            })?;

        response
            .upload_id()
            .map(String::from)
            .ok_or_else(|| StorageError::UploadFailed("No upload ID returned from S3".to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<UploadedPart> {
        let response = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                let err = sdk_error(e, StorageError::UploadFailed);
                tracing::error!(error = %err, bucket = %bucket, key = %key, part_number, "Failed to upload part");
                err
            })?;

        let etag = response.e_tag().ok_or_else(|| {
            StorageError::UploadFailed(format!("No ETag returned for part {}", part_number))
        })?;

        Ok(UploadedPart {
            part_number,
            etag: etag.to_string(),
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<Option<String>> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .into_iter()
                    .map(|part| {
                        CompletedPart::builder()
                            .part_number(part.part_number)
                            .e_tag(part.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        let response = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| {
                let err = sdk_error(e, StorageError::UploadFailed);
                tracing::error!(error = %err, bucket = %bucket, key = %key, "Failed to complete multipart upload");
                err
            })?;

        Ok(response.e_tag().map(String::from))
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| sdk_error(e, StorageError::BackendError))?;

        tracing::info!(bucket = %bucket, key = %key, upload_id = %upload_id, "S3 multipart upload aborted");
        Ok(())
    }
}
