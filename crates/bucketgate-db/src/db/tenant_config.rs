use crate::traits::TenantConfigStore;
use async_trait::async_trait;
use bucketgate_core::{AppError, Identity, TenantBackendConfig, TenantId};
use sqlx::{FromRow, PgPool, Postgres};

/// Raw `tenant_backends` row; `kind` is validated on conversion.
#[derive(FromRow)]
struct TenantBackendRow {
    id: i64,
    owner_id: i64,
    name: String,
    kind: String,
    data_plane_endpoint: String,
    control_plane_endpoint: Option<String>,
    control_plane_token: Option<String>,
    access_key_id: String,
    access_secret: String,
    region: String,
    path_style: bool,
}

impl TryFrom<TenantBackendRow> for TenantBackendConfig {
    type Error = AppError;

    fn try_from(row: TenantBackendRow) -> Result<Self, Self::Error> {
        Ok(TenantBackendConfig {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            kind: row.kind.parse()?,
            data_plane_endpoint: row.data_plane_endpoint,
            control_plane_endpoint: row.control_plane_endpoint,
            control_plane_token: row.control_plane_token,
            access_key_id: row.access_key_id,
            access_secret: row.access_secret,
            region: row.region,
            path_style: row.path_style,
        })
    }
}

#[derive(Clone)]
pub struct TenantConfigRepository {
    pool: PgPool,
}

impl TenantConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantConfigStore for TenantConfigRepository {
    /// Ownership is part of the lookup predicate.
    #[tracing::instrument(skip(self, identity), fields(db.table = "tenant_backends", db.operation = "select", user_id = identity.user_id))]
    async fn resolve(
        &self,
        tenant_id: TenantId,
        identity: &Identity,
    ) -> Result<Option<TenantBackendConfig>, AppError> {
        let row = sqlx::query_as::<Postgres, TenantBackendRow>(
            r#"
            SELECT id, owner_id, name, kind, data_plane_endpoint, control_plane_endpoint,
                   control_plane_token, access_key_id, access_secret, region, path_style
            FROM tenant_backends
            WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(identity.user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_id, "Failed to resolve tenant backend");
            AppError::Database(e)
        })?;

        row.map(TenantBackendConfig::try_from).transpose()
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketgate_core::BackendKind;

    fn row(kind: &str) -> TenantBackendRow {
        TenantBackendRow {
            id: 42,
            owner_id: 1,
            name: "primary".to_string(),
            kind: kind.to_string(),
            data_plane_endpoint: "http://s3:3900".to_string(),
            control_plane_endpoint: None,
            control_plane_token: None,
            access_key_id: "GK".to_string(),
            access_secret: "secret".to_string(),
            region: "garage".to_string(),
            path_style: true,
        }
    }

    #[test]
    fn test_row_conversion_accepts_legacy_kind() {
        let config = TenantBackendConfig::try_from(row("garage")).unwrap();
        assert_eq!(config.kind, BackendKind::Managed);
        assert_eq!(config.id, 42);
    }

    #[test]
    fn test_row_conversion_rejects_unknown_kind() {
        let err = TenantBackendConfig::try_from(row("azure")).unwrap_err();
        assert!(matches!(err, AppError::InconsistentTenantConfig(_)));
    }
}
