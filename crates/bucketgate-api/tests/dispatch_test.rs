mod helpers;

use helpers::auth::{bearer, expired_token_for};
use helpers::fixtures::{managed_tenant, OWNER, STRANGER};
use bucketgate_core::GatewayConfig;
use helpers::{setup_test_app, setup_test_app_with_config, JWT_SECRET};
use serde_json::Value;

/// A tenant owned by someone else must be indistinguishable from a missing one
#[tokio::test]
async fn test_foreign_tenant_looks_like_missing_tenant() {
    let app = setup_test_app(vec![managed_tenant(7, OWNER, None)]).await;
    let client = app.client();

    let foreign = client
        .get("/api/7/s3/list-buckets")
        .add_header("Authorization", bearer(STRANGER))
        .await;
    let missing = client
        .get("/api/999/s3/list-buckets")
        .add_header("Authorization", bearer(STRANGER))
        .await;

    assert_eq!(foreign.status_code(), 404);
    assert_eq!(missing.status_code(), 404);
    let foreign_body: Value = foreign.json();
    let missing_body: Value = missing.json();
    assert_eq!(foreign_body, missing_body);
    assert_eq!(foreign_body["code"], "TENANT_NOT_FOUND");
    assert_eq!(foreign_body["status"], 404);
    assert_eq!(foreign_body["error"], "Not Found");

    // Nothing was built for the stranger
    assert!(app.clients.issued().is_empty());
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = setup_test_app(vec![managed_tenant(7, OWNER, None)]).await;

    let response = app.client().get("/api/7/s3/list-buckets").await;
    assert_eq!(response.status_code(), 401);

    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_repeated_auth_failures_are_throttled_as_json() {
    let mut config = GatewayConfig::for_tests(JWT_SECRET);
    config.auth_max_failures = 3;
    let app = setup_test_app_with_config(config, vec![managed_tenant(7, OWNER, None)]).await;
    let client = app.client();

    for _ in 0..2 {
        let response = client
            .get("/api/7/s3/list-buckets")
            .add_header("Authorization", "Bearer not-a-jwt")
            .await;
        assert_eq!(response.status_code(), 401);
    }

    let throttled = client
        .get("/api/7/s3/list-buckets")
        .add_header("Authorization", "Bearer not-a-jwt")
        .await;
    assert_eq!(throttled.status_code(), 429);
    let body: Value = throttled.json();
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");
    assert_eq!(body["status"], 429);

    // A valid token from the same client stays blocked for the window
    let blocked = client
        .get("/api/7/s3/list-buckets")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(blocked.status_code(), 429);
    let body: Value = blocked.json();
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let app = setup_test_app(vec![managed_tenant(7, OWNER, None)]).await;

    let response = app
        .client()
        .get("/api/7/s3/list-buckets")
        .add_header("Authorization", format!("Bearer {}", expired_token_for(OWNER)))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_non_numeric_tenant_is_malformed_path() {
    let app = setup_test_app(vec![]).await;

    let response = app
        .client()
        .get("/api/abc/s3/list-buckets")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["code"], "MALFORMED_PATH");
}

#[tokio::test]
async fn test_path_without_service_is_malformed() {
    let app = setup_test_app(vec![managed_tenant(7, OWNER, None)]).await;

    let response = app
        .client()
        .get("/api/7")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_unknown_service_and_operation() {
    let app = setup_test_app(vec![managed_tenant(7, OWNER, None)]).await;
    let client = app.client();

    let service = client
        .post("/api/7/ftp/list")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(service.status_code(), 404);
    let body: Value = service.json();
    assert_eq!(body["code"], "UNKNOWN_SERVICE");

    let operation = client
        .post("/api/7/s3/copy-object")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(operation.status_code(), 404);
    let body: Value = operation.json();
    assert_eq!(body["code"], "UNKNOWN_OPERATION");
}

#[tokio::test]
async fn test_wrong_method_carries_allow_header() {
    let app = setup_test_app(vec![managed_tenant(7, OWNER, None)]).await;
    let client = app.client();

    let response = client
        .get("/api/7/s3/delete-object")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(response.status_code(), 405);
    assert_eq!(response.header("allow"), "POST");

    let response = client
        .delete("/api/7/s3/list-buckets")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(response.status_code(), 405);
    assert_eq!(response.header("allow"), "GET, POST");
}

#[tokio::test]
async fn test_control_plane_requires_admin_endpoint() {
    let app = setup_test_app(vec![managed_tenant(7, OWNER, None)]).await;

    let response = app
        .client()
        .get("/api/7/v2/status")
        .add_header("Authorization", bearer(OWNER))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["code"], "CONTROL_PLANE_NOT_CONFIGURED");
}

#[tokio::test]
async fn test_health_and_openapi_are_public() {
    let app = setup_test_app(vec![]).await;
    let client = app.client();

    let health = client.get("/health").await;
    assert_eq!(health.status_code(), 200);
    let body: Value = health.json();
    assert_eq!(body["status"], "healthy");

    let spec = client.get("/openapi.json").await;
    assert_eq!(spec.status_code(), 200);
    let body: Value = spec.json();
    assert!(body["paths"]["/api/{project_id}/s3/put-object"].is_object());
}
