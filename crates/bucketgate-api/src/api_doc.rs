//! OpenAPI documentation.
//! Served at `/openapi.json` and rendered by RapiDoc at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use bucketgate_core::models;

/// Returns the OpenAPI document of the gateway.
pub fn openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bucketgate API",
        version = "0.1.0",
        description = "Multi-tenant object-storage gateway. Data-plane operations live under /api/{project_id}/s3/, the tenant's admin API is reverse-proxied under /api/{project_id}/v{N}/ and the activity log is at /api/{project_id}/logs. Paths under v{N} are forwarded verbatim and are not listed here."
    ),
    paths(
        // Data plane
        handlers::storage::list_buckets,
        handlers::storage::create_bucket,
        handlers::storage::delete_bucket,
        handlers::storage::list_objects,
        handlers::storage::get_object,
        handlers::storage::put_object,
        handlers::storage::delete_object,
        // Activity
        handlers::logs::list_logs,
    ),
    components(
        schemas(
            models::storage::CredentialFields,
            models::storage::ListBucketsRequest,
            models::storage::BucketRequest,
            models::storage::ListObjectsRequest,
            models::storage::ObjectRequest,
            models::storage::BucketSummary,
            models::storage::ListBucketsResponse,
            models::storage::ObjectSummary,
            models::storage::ListObjectsResponse,
            models::storage::PresignedUrlResponse,
            models::storage::SuccessResponse,
            models::storage::UploadResponse,
            handlers::storage::UploadForm,
            models::ActivityRecord,
            models::ActivityPage,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "storage", description = "Bucket and object operations against the tenant's object storage"),
        (name = "activity", description = "Audit trail of mutating storage operations")
    )
)]
pub struct ApiDoc;
