//! Data-plane handlers
//!
//! One function per operation of the `s3` service. Each builds a request-scoped
//! client from the tenant's stored credentials (or the caller's override on
//! managed backends), runs the operation adapter under a deadline and renders
//! the JSON result. Mutating operations leave an activity record.

use crate::dispatcher::Operation;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, Method};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bucketgate_core::models::storage::{
    BucketRequest, CredentialFields, ListBucketsRequest, ListBucketsResponse, ListObjectsRequest,
    ListObjectsResponse, ObjectRequest, PresignedUrlResponse, SuccessResponse, UploadResponse,
};
use bucketgate_core::models::{ActivityAction, ActivityOutcome, NewActivity};
use bucketgate_core::{AppError, Identity, TenantBackendConfig};
use bucketgate_storage::{operations, resolve_credentials, BucketClient, CredentialOverride, UploadTarget};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use validator::Validate;

/// Resolved tenant and caller of one data-plane request.
pub struct TenantRequest {
    pub tenant: TenantBackendConfig,
    pub identity: Identity,
}

pub async fn handle(
    state: &AppState,
    ctx: &TenantRequest,
    operation: Operation,
    request: Request,
) -> Result<Response, HttpAppError> {
    match operation {
        Operation::ListBuckets => list_buckets(state, ctx, request).await.map(IntoResponse::into_response),
        Operation::CreateBucket => create_bucket(state, ctx, request).await.map(IntoResponse::into_response),
        Operation::DeleteBucket => delete_bucket(state, ctx, request).await.map(IntoResponse::into_response),
        Operation::ListObjects => list_objects(state, ctx, request).await.map(IntoResponse::into_response),
        Operation::GetObject => get_object(state, ctx, request).await.map(IntoResponse::into_response),
        Operation::PutObject => put_object(state, ctx, request).await,
        Operation::DeleteObject => delete_object(state, ctx, request).await.map(IntoResponse::into_response),
    }
}

fn client_for(
    state: &AppState,
    ctx: &TenantRequest,
    fields: &CredentialFields,
) -> Result<Arc<dyn BucketClient>, HttpAppError> {
    let override_pair = CredentialOverride::from_fields(fields)?;
    let credentials = resolve_credentials(&ctx.tenant, override_pair.as_ref())?;
    Ok(state.clients.build(&credentials)?)
}

/// Run an upstream call under `deadline`; dropping the future cancels the call.
async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, HttpAppError>
where
    F: Future<Output = Result<T, bucketgate_storage::StorageError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::UpstreamTimeout(format!(
            "Object storage did not respond within {}s",
            deadline.as_secs()
        ))
        .into()),
    }
}

async fn json_body<T>(request: Request) -> Result<T, HttpAppError>
where
    T: DeserializeOwned + Validate + Send,
{
    let ValidatedJson(body) = ValidatedJson::<T>::from_request(request, &()).await?;
    Ok(body)
}

/// Hand an activity record to the recorder without waiting for it.
fn record_activity<T>(
    state: &AppState,
    ctx: &TenantRequest,
    action: ActivityAction,
    detail: String,
    result: &Result<T, HttpAppError>,
) {
    let entry = NewActivity {
        tenant_id: ctx.tenant.id,
        user_id: ctx.identity.user_id,
        action,
        detail,
        outcome: if result.is_ok() {
            ActivityOutcome::Success
        } else {
            ActivityOutcome::Failure
        },
    };
    let recorder = state.activity.clone();

    tokio::spawn(async move {
        let action = entry.action.as_str();
        let tenant_id = entry.tenant_id;
        if let Err(e) = recorder.record(entry).await {
            tracing::warn!(error = %e, tenant_id, action, "Failed to record activity");
        }
    });
}

/// List the buckets visible to the tenant's credentials
#[utoipa::path(
    post,
    path = "/api/{project_id}/s3/list-buckets",
    tag = "storage",
    params(("project_id" = i64, Path, description = "Tenant id")),
    request_body(content = ListBucketsRequest, description = "Optional credential override; GET takes no body"),
    responses(
        (status = 200, description = "Buckets listed", body = ListBucketsResponse),
        (status = 400, description = "Invalid credential override", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 502, description = "Object storage error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_buckets(
    state: &AppState,
    ctx: &TenantRequest,
    request: Request,
) -> Result<Json<ListBucketsResponse>, HttpAppError> {
    let body = if request.method() == Method::GET || !request.headers().contains_key(header::CONTENT_TYPE) {
        ListBucketsRequest::default()
    } else {
        json_body::<ListBucketsRequest>(request).await?
    };

    let client = client_for(state, ctx, &body.credentials)?;
    let response = with_deadline(state.config.request_timeout(), operations::list_buckets(client.as_ref())).await?;
    Ok(Json(response))
}

/// Create a bucket
#[utoipa::path(
    post,
    path = "/api/{project_id}/s3/create-bucket",
    tag = "storage",
    params(("project_id" = i64, Path, description = "Tenant id")),
    request_body = BucketRequest,
    responses(
        (status = 200, description = "Bucket created", body = SuccessResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 502, description = "Object storage error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_bucket(
    state: &AppState,
    ctx: &TenantRequest,
    request: Request,
) -> Result<Json<SuccessResponse>, HttpAppError> {
    let body = json_body::<BucketRequest>(request).await?;
    let client = client_for(state, ctx, &body.credentials)?;

    let result = with_deadline(
        state.config.request_timeout(),
        operations::create_bucket(client.as_ref(), &body.bucket),
    )
    .await;
    record_activity(state, ctx, ActivityAction::CreateBucket, body.bucket.clone(), &result);

    if result.is_ok() {
        tracing::info!(tenant_id = ctx.tenant.id, bucket = %body.bucket, "Bucket created");
    }
    result.map(Json)
}

/// Delete an empty bucket
#[utoipa::path(
    post,
    path = "/api/{project_id}/s3/delete-bucket",
    tag = "storage",
    params(("project_id" = i64, Path, description = "Tenant id")),
    request_body = BucketRequest,
    responses(
        (status = 200, description = "Bucket deleted", body = SuccessResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 502, description = "Object storage error, e.g. bucket not empty", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_bucket(
    state: &AppState,
    ctx: &TenantRequest,
    request: Request,
) -> Result<Json<SuccessResponse>, HttpAppError> {
    let body = json_body::<BucketRequest>(request).await?;
    let client = client_for(state, ctx, &body.credentials)?;

    let result = with_deadline(
        state.config.request_timeout(),
        operations::delete_bucket(client.as_ref(), &body.bucket),
    )
    .await;
    record_activity(state, ctx, ActivityAction::DeleteBucket, body.bucket.clone(), &result);

    result.map(Json)
}

/// List one page of objects plus the byte total of the bucket
///
/// `totalSize` is -1 when the total could not be computed.
#[utoipa::path(
    post,
    path = "/api/{project_id}/s3/list-objects",
    tag = "storage",
    params(("project_id" = i64, Path, description = "Tenant id")),
    request_body = ListObjectsRequest,
    responses(
        (status = 200, description = "Objects listed", body = ListObjectsResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 502, description = "Object storage error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_objects(
    state: &AppState,
    ctx: &TenantRequest,
    request: Request,
) -> Result<Json<ListObjectsResponse>, HttpAppError> {
    let body = json_body::<ListObjectsRequest>(request).await?;
    let client = client_for(state, ctx, &body.credentials)?;

    let response = with_deadline(
        state.config.request_timeout(),
        operations::list_objects(client.as_ref(), &body),
    )
    .await?;
    Ok(Json(response))
}

/// Presigned download URL for an object
#[utoipa::path(
    post,
    path = "/api/{project_id}/s3/get-object",
    tag = "storage",
    params(("project_id" = i64, Path, description = "Tenant id")),
    request_body = ObjectRequest,
    responses(
        (status = 200, description = "Presigned URL generated", body = PresignedUrlResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_object(
    state: &AppState,
    ctx: &TenantRequest,
    request: Request,
) -> Result<Json<PresignedUrlResponse>, HttpAppError> {
    let body = json_body::<ObjectRequest>(request).await?;
    let client = client_for(state, ctx, &body.credentials)?;

    let response = with_deadline(
        state.config.request_timeout(),
        operations::presign_get_object(client.as_ref(), &body.bucket, &body.key),
    )
    .await?;
    Ok(Json(response))
}

/// Multipart form of a streamed upload. Text fields must precede `file`.
///
/// Schema only: it documents the OpenAPI request body. Fields are read one at
/// a time into `PendingUpload` as the multipart stream arrives.
#[derive(ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase")]
pub struct UploadForm {
    bucket: String,
    key: String,
    /// Declared size in bytes; checked against what was received
    file_size: Option<u64>,
    content_type: Option<String>,
    key_id: Option<String>,
    token: Option<String>,
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Presigned upload URL (JSON body) or streamed upload (multipart body)
#[utoipa::path(
    post,
    path = "/api/{project_id}/s3/put-object",
    tag = "storage",
    params(("project_id" = i64, Path, description = "Tenant id")),
    request_body(content(
        (ObjectRequest = "application/json"),
        (UploadForm = "multipart/form-data")
    )),
    responses(
        (status = 200, description = "Presigned URL generated (JSON) or object uploaded (multipart)", body = UploadResponse),
        (status = 400, description = "Invalid input or size mismatch", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 502, description = "Object storage error", body = ErrorResponse),
        (status = 504, description = "Upload deadline exceeded", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn put_object(
    state: &AppState,
    ctx: &TenantRequest,
    request: Request,
) -> Result<Response, HttpAppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::InvalidInput(format!("Invalid multipart body: {}", e.body_text())))?;
        return stream_upload(state, ctx, multipart)
            .await
            .map(|uploaded| Json(uploaded).into_response());
    }

    let body = json_body::<ObjectRequest>(request).await?;
    let client = client_for(state, ctx, &body.credentials)?;
    let response = with_deadline(
        state.config.request_timeout(),
        operations::presign_put_object(
            client.as_ref(),
            &body.bucket,
            &body.key,
            body.content_type.as_deref(),
        ),
    )
    .await?;
    Ok(Json(response).into_response())
}

/// Text fields collected before the `file` part arrives.
#[derive(Default)]
struct PendingUpload {
    bucket: Option<String>,
    key: Option<String>,
    file_size: Option<u64>,
    content_type: Option<String>,
    credentials: CredentialFields,
}

impl PendingUpload {
    fn set(&mut self, name: &str, value: String) -> Result<(), AppError> {
        match name {
            "bucket" => self.bucket = Some(value),
            "key" => self.key = Some(value),
            "fileSize" => {
                let size = value.trim().parse::<u64>().map_err(|_| {
                    AppError::InvalidInput(format!("fileSize must be a non-negative integer, got '{}'", value))
                })?;
                self.file_size = Some(size);
            }
            "contentType" => self.content_type = Some(value).filter(|v| !v.is_empty()),
            "keyId" => self.credentials.key_id = Some(value),
            "token" => self.credentials.token = Some(value),
            other => tracing::debug!(field = other, "Ignoring unknown upload form field"),
        }
        Ok(())
    }

    fn into_target(self) -> Result<(UploadTarget, CredentialFields), AppError> {
        let missing = |field: &str| {
            AppError::InvalidInput(format!("{} is required and must precede the file field", field))
        };
        let bucket = self.bucket.filter(|b| !b.trim().is_empty()).ok_or_else(|| missing("bucket"))?;
        let key = self.key.filter(|k| !k.trim().is_empty()).ok_or_else(|| missing("key"))?;

        Ok((
            UploadTarget {
                bucket,
                key,
                content_type: self.content_type,
                expected_size: self.file_size,
            },
            self.credentials,
        ))
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::InvalidInput(format!("Invalid multipart body: {}", err.body_text()))
}

#[tracing::instrument(skip_all, fields(tenant_id = ctx.tenant.id))]
async fn stream_upload(
    state: &AppState,
    ctx: &TenantRequest,
    mut multipart: Multipart,
) -> Result<UploadResponse, HttpAppError> {
    let mut pending = PendingUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let (target, credentials) = pending.into_target()?;
            let client = client_for(state, ctx, &credentials)?;
            let detail = format!("{}/{}", target.bucket, target.key);

            let result = with_deadline(
                state.config.upload_timeout(),
                operations::upload_stream(client, target, Box::pin(field)),
            )
            .await;
            record_activity(state, ctx, ActivityAction::UploadObject, detail.clone(), &result);

            if let Ok(uploaded) = &result {
                tracing::info!(object = %detail, size = uploaded.size, "Object uploaded");
            }
            return result;
        }

        let value = field.text().await.map_err(multipart_error)?;
        pending.set(&name, value)?;
    }

    Err(AppError::InvalidInput("Multipart body has no file field".to_string()).into())
}

/// Delete an object
#[utoipa::path(
    post,
    path = "/api/{project_id}/s3/delete-object",
    tag = "storage",
    params(("project_id" = i64, Path, description = "Tenant id")),
    request_body = ObjectRequest,
    responses(
        (status = 200, description = "Object deleted", body = SuccessResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 502, description = "Object storage error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_object(
    state: &AppState,
    ctx: &TenantRequest,
    request: Request,
) -> Result<Json<SuccessResponse>, HttpAppError> {
    let body = json_body::<ObjectRequest>(request).await?;
    let client = client_for(state, ctx, &body.credentials)?;

    let result = with_deadline(
        state.config.request_timeout(),
        operations::delete_object(client.as_ref(), &body.bucket, &body.key),
    )
    .await;
    record_activity(
        state,
        ctx,
        ActivityAction::DeleteObject,
        format!("{}/{}", body.bucket, body.key),
        &result,
    );

    result.map(Json)
}
