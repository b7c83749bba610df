use crate::credentials::ResolvedCredentials;
use crate::traits::{BucketClient, StorageResult};
use std::sync::Arc;

#[cfg(feature = "storage-s3")]
use crate::s3::S3BucketClient;
#[cfg(feature = "storage-s3")]
use aws_config::{BehaviorVersion, SdkConfig};
#[cfg(feature = "storage-s3")]
use aws_sdk_s3::config::retry::RetryConfig;
#[cfg(feature = "storage-s3")]
use aws_sdk_s3::config::timeout::TimeoutConfig;
#[cfg(feature = "storage-s3")]
use aws_sdk_s3::config::{Credentials, Region};
#[cfg(feature = "storage-s3")]
use std::time::Duration;

/// Builds a request-scoped client for one set of resolved credentials.
pub trait ClientFactory: Send + Sync {
    fn build(&self, credentials: &ResolvedCredentials) -> StorageResult<Arc<dyn BucketClient>>;
}

/// aws-sdk-s3 backed factory.
///
/// Holds one base `SdkConfig` loaded at start-up; every client derived from it
/// shares the SDK's HTTP connection pool while carrying its own endpoint,
/// credentials, region and addressing style.
#[cfg(feature = "storage-s3")]
#[derive(Clone)]
pub struct S3ClientFactory {
    base: SdkConfig,
    connect_timeout: Duration,
}

#[cfg(feature = "storage-s3")]
impl S3ClientFactory {
    pub async fn new(connect_timeout: Duration) -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(bucketgate_core::constants::EXTERNAL_DEFAULT_REGION))
            .no_credentials()
            .load()
            .await;

        tracing::info!(
            connect_timeout_ms = connect_timeout.as_millis() as u64,
            "S3 client factory initialized"
        );

        Self {
            base,
            connect_timeout,
        }
    }
}

#[cfg(feature = "storage-s3")]
impl ClientFactory for S3ClientFactory {
    fn build(&self, credentials: &ResolvedCredentials) -> StorageResult<Arc<dyn BucketClient>> {
        let provider = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.access_secret.clone(),
            None,
            None,
            "bucketgate",
        );

        // Storage calls are not assumed idempotent, so the SDK must not replay them.
        let mut builder = aws_sdk_s3::config::Builder::from(&self.base)
            .credentials_provider(provider)
            .region(Region::new(credentials.region.clone()))
            .force_path_style(credentials.path_style)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(self.connect_timeout)
                    .build(),
            );

        if let Some(endpoint) = &credentials.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());

        tracing::debug!(
            endpoint = credentials.endpoint.as_deref().unwrap_or("aws"),
            region = %credentials.region,
            path_style = credentials.path_style,
            "Built request-scoped S3 client"
        );

        Ok(Arc::new(S3BucketClient::new(
            client,
            credentials.region.clone(),
        )))
    }
}
