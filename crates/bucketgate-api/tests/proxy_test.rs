mod helpers;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bucketgate_api::setup::routes::setup_routes;
use bucketgate_api::setup::server::serve;
use bucketgate_core::{GatewayConfig, TenantBackendConfig};
use helpers::auth::bearer;
use helpers::fixtures::{managed_tenant, OWNER};
use helpers::{build_state, JWT_SECRET};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

/// Echoes what the admin endpoint received
async fn echo(request: Request) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let header_value = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "authorization": header_value("authorization"),
        "forwardedFor": header_value("x-forwarded-for"),
        "forwardedHost": header_value("x-forwarded-host"),
        "forwardedProto": header_value("x-forwarded-proto"),
        "custom": header_value("x-custom"),
        "body": String::from_utf8_lossy(&body),
        "bodyLength": body.len(),
    }))
}

async fn redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/v2/elsewhere")]).into_response()
}

async fn start_admin_api() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/v2/moved", get(redirect))
        .fallback(echo);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Run the gateway over real TCP so requests carry a socket peer.
async fn start_gateway(tenants: Vec<TenantBackendConfig>) -> SocketAddr {
    start_gateway_with_config(GatewayConfig::for_tests(JWT_SECRET), tenants).await
}

async fn start_gateway_with_config(
    config: GatewayConfig,
    tenants: Vec<TenantBackendConfig>,
) -> SocketAddr {
    let (state, _, _, _) = build_state(config.clone(), tenants);
    let app = setup_routes(&config, state).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, app, Duration::from_secs(5), std::future::pending())
            .await
            .unwrap();
    });
    addr
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_control_plane_request_is_rewritten_and_forwarded() {
    let admin = start_admin_api().await;
    let gateway = start_gateway(vec![managed_tenant(
        7,
        OWNER,
        Some(&format!("http://{}", admin)),
    )])
    .await;

    let response = http_client()
        .get(format!("http://{}/api/7/v2/status?verbose=1", gateway))
        .header("Authorization", bearer(OWNER))
        .header("X-Custom", "kept")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen: Value = response.json().await.unwrap();
    assert_eq!(seen["method"], "GET");
    assert_eq!(seen["path"], "/v2/status");
    assert_eq!(seen["query"], "verbose=1");
    assert_eq!(seen["authorization"], "Bearer admin-token");
    assert_eq!(seen["forwardedFor"], "127.0.0.1");
    assert_eq!(seen["forwardedHost"], gateway.to_string());
    assert_eq!(seen["forwardedProto"], "http");
    assert_eq!(seen["custom"], "kept");
}

#[tokio::test]
async fn test_control_plane_body_is_streamed_through() {
    let admin = start_admin_api().await;
    let gateway = start_gateway(vec![managed_tenant(
        7,
        OWNER,
        Some(&format!("http://{}/", admin)),
    )])
    .await;

    let response = http_client()
        .post(format!("http://{}/api/7/v1/bucket", gateway))
        .header("Authorization", bearer(OWNER))
        .header("Content-Type", "application/json")
        .body(r#"{"globalAlias":"photos"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen: Value = response.json().await.unwrap();
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["path"], "/v1/bucket");
    assert_eq!(seen["body"], r#"{"globalAlias":"photos"}"#);
}

#[tokio::test]
async fn test_http2_streamed_body_reaches_admin_api() {
    let admin = start_admin_api().await;
    let gateway = start_gateway(vec![managed_tenant(
        7,
        OWNER,
        Some(&format!("http://{}", admin)),
    )])
    .await;

    let client = reqwest::Client::builder()
        .no_proxy()
        .http2_prior_knowledge()
        .build()
        .unwrap();
    let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("chunk-one;"), Ok("chunk-2")];
    let response = client
        .post(format!("http://{}/api/7/v1/bucket", gateway))
        .header("Authorization", bearer(OWNER))
        .body(reqwest::Body::wrap_stream(futures::stream::iter(chunks)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.version(), reqwest::Version::HTTP_2);
    assert_eq!(response.status(), 200);

    let seen: Value = response.json().await.unwrap();
    assert_eq!(seen["path"], "/v1/bucket");
    assert_eq!(seen["bodyLength"], 17);
    assert_eq!(seen["body"], "chunk-one;chunk-2");
    assert_eq!(seen["forwardedHost"], gateway.to_string());
}

#[tokio::test]
async fn test_trusted_proxy_forwarding_headers_are_honoured() {
    let admin = start_admin_api().await;
    let gateway = start_gateway(vec![managed_tenant(
        7,
        OWNER,
        Some(&format!("http://{}", admin)),
    )])
    .await;

    // Loopback is in the default trusted networks
    let response = http_client()
        .get(format!("http://{}/api/7/v2/status", gateway))
        .header("Authorization", bearer(OWNER))
        .header("X-Forwarded-Host", "storage.example.com")
        .header("X-Forwarded-Proto", "https")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen: Value = response.json().await.unwrap();
    assert_eq!(seen["forwardedHost"], "storage.example.com");
    assert_eq!(seen["forwardedProto"], "https");
}

#[tokio::test]
async fn test_untrusted_peer_cannot_set_forwarding_headers() {
    let admin = start_admin_api().await;
    let mut config = GatewayConfig::for_tests(JWT_SECRET);
    config.trusted_proxy_networks = Vec::new();
    let gateway = start_gateway_with_config(
        config,
        vec![managed_tenant(7, OWNER, Some(&format!("http://{}", admin)))],
    )
    .await;

    let response = http_client()
        .get(format!("http://{}/api/7/v2/status", gateway))
        .header("Authorization", bearer(OWNER))
        .header("X-Forwarded-Host", "forged.example.net")
        .header("X-Forwarded-Proto", "https")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen: Value = response.json().await.unwrap();
    assert_eq!(seen["forwardedHost"], gateway.to_string());
    assert_eq!(seen["forwardedProto"], "http");
}

#[tokio::test]
async fn test_caller_bearer_dropped_without_admin_token() {
    let admin = start_admin_api().await;
    let mut tenant = managed_tenant(7, OWNER, Some(&format!("http://{}", admin)));
    tenant.control_plane_token = None;
    let gateway = start_gateway(vec![tenant]).await;

    let response = http_client()
        .get(format!("http://{}/api/7/v2/status", gateway))
        .header("Authorization", bearer(OWNER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen: Value = response.json().await.unwrap();
    assert!(seen["authorization"].is_null());
}

#[tokio::test]
async fn test_redirects_are_relayed_not_followed() {
    let admin = start_admin_api().await;
    let gateway = start_gateway(vec![managed_tenant(
        7,
        OWNER,
        Some(&format!("http://{}", admin)),
    )])
    .await;

    let response = http_client()
        .get(format!("http://{}/api/7/v2/moved", gateway))
        .header("Authorization", bearer(OWNER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 302);
    assert_eq!(response.headers()["location"], "/v2/elsewhere");
}

#[tokio::test]
async fn test_unreachable_admin_endpoint_is_bad_gateway() {
    // Grab a free port and release it so nothing listens there
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let gateway = start_gateway(vec![managed_tenant(
        7,
        OWNER,
        Some(&format!("http://{}", closed)),
    )])
    .await;

    let response = http_client()
        .get(format!("http://{}/api/7/v2/status", gateway))
        .header("Authorization", bearer(OWNER))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert_eq!(body["status"], 502);
}
