//! In-memory collaborators for local runs and tests.

use crate::traits::{ActivityRecorder, TenantConfigStore};
use async_trait::async_trait;
use bucketgate_core::models::{ActivityRecord, NewActivity};
use bucketgate_core::{AppError, Identity, TenantBackendConfig, TenantId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct InMemoryTenantConfigStore {
    configs: RwLock<HashMap<TenantId, TenantBackendConfig>>,
}

impl InMemoryTenantConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(configs: impl IntoIterator<Item = TenantBackendConfig>) -> Self {
        let store = Self::new();
        for config in configs {
            store.insert(config);
        }
        store
    }

    pub fn insert(&self, config: TenantBackendConfig) {
        let mut guard = match self.configs.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(config.id, config);
    }
}

#[async_trait]
impl TenantConfigStore for InMemoryTenantConfigStore {
    async fn resolve(
        &self,
        tenant_id: TenantId,
        identity: &Identity,
    ) -> Result<Option<TenantBackendConfig>, AppError> {
        let guard = self.configs.read().map_err(poisoned)?;
        Ok(guard
            .get(&tenant_id)
            .filter(|config| config.is_owned_by(identity))
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryActivityLog {
    records: RwLock<Vec<ActivityRecord>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn records(&self) -> Vec<ActivityRecord> {
        match self.records.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ActivityRecorder for InMemoryActivityLog {
    async fn record(&self, entry: NewActivity) -> Result<(), AppError> {
        let mut guard = self.records.write().map_err(poisoned)?;
        let id = guard.len() as i64 + 1;
        guard.push(ActivityRecord {
            id,
            tenant_id: entry.tenant_id,
            user_id: entry.user_id,
            action: entry.action.as_str().to_string(),
            detail: entry.detail,
            outcome: entry.outcome.as_str().to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRecord>, i64), AppError> {
        let guard = self.records.read().map_err(poisoned)?;
        let matching: Vec<&ActivityRecord> = guard
            .iter()
            .rev()
            .filter(|r| r.tenant_id == tenant_id)
            .collect();
        let total = matching.len() as i64;
        let offset = page.saturating_sub(1) as usize * limit as usize;
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}
