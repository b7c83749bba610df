//! Collaborator traits consumed by the gateway request path.

use async_trait::async_trait;
use bucketgate_core::models::{ActivityRecord, NewActivity};
use bucketgate_core::{AppError, Identity, TenantBackendConfig, TenantId};

/// Resolves a tenant's backend configuration for a caller.
///
/// Returns `Ok(None)` both when the tenant does not exist and when it exists but
/// is owned by someone else; callers cannot tell the two apart.
#[async_trait]
pub trait TenantConfigStore: Send + Sync {
    async fn resolve(
        &self,
        tenant_id: TenantId,
        identity: &Identity,
    ) -> Result<Option<TenantBackendConfig>, AppError>;

    /// Liveness of the backing store.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Persists and lists tenant activity records.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record(&self, entry: NewActivity) -> Result<(), AppError>;

    /// One page of records (1-based `page`), newest first, plus the total count.
    async fn list(
        &self,
        tenant_id: TenantId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRecord>, i64), AppError>;
}
