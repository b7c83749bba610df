use crate::traits::ActivityRecorder;
use async_trait::async_trait;
use bucketgate_core::models::{ActivityRecord, NewActivity};
use bucketgate_core::{AppError, TenantId};
use sqlx::{PgPool, Postgres};

#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRecorder for ActivityRepository {
    #[tracing::instrument(skip(self, entry), fields(db.table = "activity_logs", db.operation = "insert", tenant_id = entry.tenant_id, action = entry.action.as_str()))]
    async fn record(&self, entry: NewActivity) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (tenant_id, user_id, action, detail, outcome)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.tenant_id)
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(&entry.detail)
        .bind(entry.outcome.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record activity");
            AppError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "activity_logs", db.operation = "select"))]
    async fn list(
        &self,
        tenant_id: TenantId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRecord>, i64), AppError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);

        let total: i64 = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM activity_logs WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count activity records");
            AppError::Database(e)
        })?;

        let records = sqlx::query_as::<Postgres, ActivityRecord>(
            r#"
            SELECT id, tenant_id, user_id, action, detail, outcome, created_at
            FROM activity_logs
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list activity records");
            AppError::Database(e)
        })?;

        Ok((records, total))
    }
}
