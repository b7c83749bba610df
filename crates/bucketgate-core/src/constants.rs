//! Application-wide constants.

use std::time::Duration;

/// Mount root of every tenant-scoped route.
pub const API_PREFIX: &str = "/api";

/// First path segment selecting the object-storage operations.
pub const DATA_PLANE_MARKER: &str = "s3";

/// First path segment selecting the tenant activity log.
pub const ACTIVITY_LOG_MARKER: &str = "logs";

/// Control-plane markers are this prefix followed by a version number (`v1`, `v2`, ...).
pub const CONTROL_PLANE_MARKER_PREFIX: char = 'v';

/// Lifetime of presigned GET/PUT URLs.
pub const PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Size of one part in a streamed multipart upload. S3 requires at least 5 MiB
/// for every part except the last.
pub const MULTIPART_PART_SIZE: usize = 8 * 1024 * 1024;

/// Reported as `totalSize` when the bucket-wide aggregate could not be computed.
pub const UNKNOWN_TOTAL_SIZE: i64 = -1;

/// Upper bound on listing pages walked while aggregating a bucket's size.
pub const MAX_AGGREGATE_PAGES: usize = 1000;

pub const DEFAULT_LOG_PAGE_SIZE: u32 = 50;
pub const MAX_LOG_PAGE_SIZE: u32 = 100;

/// Region used when a managed backend has none stored.
pub const MANAGED_DEFAULT_REGION: &str = "garage";

/// Region used when an external backend has none stored.
pub const EXTERNAL_DEFAULT_REGION: &str = "us-east-1";
