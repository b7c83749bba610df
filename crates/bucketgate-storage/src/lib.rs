//! Bucketgate Storage Library
//!
//! Everything that talks to a tenant's object-storage endpoint: the credential
//! resolver, the per-request client factory, the `BucketClient` abstraction with
//! its aws-sdk-s3 and in-memory implementations, and the operation adapters the
//! HTTP layer calls into.
//!
//! Clients are request-scoped. A client is built from [`ResolvedCredentials`] for
//! one request and dropped with it; only the underlying connection pool is shared.

pub mod credentials;
pub mod factory;
pub mod memory;
pub mod operations;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use credentials::{resolve_credentials, CredentialOverride, ResolvedCredentials};
pub use factory::ClientFactory;
#[cfg(feature = "storage-s3")]
pub use factory::S3ClientFactory;
pub use memory::{MemoryClientFactory, MemoryObjectStore};
pub use operations::UploadTarget;
#[cfg(feature = "storage-s3")]
pub use s3::S3BucketClient;
pub use traits::{
    BucketClient, BucketInfo, ObjectInfo, ObjectPage, StorageError, StorageResult, UploadedPart,
};
