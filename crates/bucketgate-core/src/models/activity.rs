use crate::models::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mutating data-plane actions that leave an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    CreateBucket,
    DeleteBucket,
    UploadObject,
    DeleteObject,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::CreateBucket => "create_bucket",
            ActivityAction::DeleteBucket => "delete_bucket",
            ActivityAction::UploadObject => "upload_object",
            ActivityAction::DeleteObject => "delete_object",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityOutcome {
    Success,
    Failure,
}

impl ActivityOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityOutcome::Success => "success",
            ActivityOutcome::Failure => "failure",
        }
    }
}

/// Activity entry as handed to the recorder.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub tenant_id: TenantId,
    pub user_id: i64,
    pub action: ActivityAction,
    pub detail: String,
    pub outcome: ActivityOutcome,
}

/// Stored activity entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: i64,
    pub tenant_id: TenantId,
    pub user_id: i64,
    pub action: String,
    pub detail: String,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

/// Page of activity records, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityPage {
    pub logs: Vec<ActivityRecord>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}
