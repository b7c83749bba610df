//! Route configuration and setup.
//!
//! Public routes are health and API docs. Everything under the mount root goes
//! through the auth middleware into the dispatcher.

mod health;

use crate::api_doc;
use crate::auth::middleware::{auth_middleware, AuthFailureLimiter, AuthState};
use crate::constants::{API_PREFIX, OPENAPI_PATH};
use crate::dispatcher;
use crate::state::AppState;
use crate::utils::ip_extraction::TrustedProxies;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{any, get},
    Json, Router,
};
use bucketgate_core::GatewayConfig;
use bucketgate_infra::request_id_middleware;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub async fn setup_routes(
    config: &GatewayConfig,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = setup_auth_state(config, &state);

    let protected_routes = gateway_routes().layer(axum::middleware::from_fn_with_state(
        Arc::new(auth_state),
        auth_middleware,
    ));

    let http_concurrency_limit = config.http_concurrency_limit();
    tracing::info!(
        http_concurrency_limit,
        max_upload_size_bytes = config.max_upload_size_bytes(),
        "HTTP limits configured"
    );

    let app = public_routes()
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes()))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &GatewayConfig) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

const AUTH_LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

fn setup_auth_state(config: &GatewayConfig, state: &Arc<AppState>) -> AuthState {
    let limiter = Arc::new(AuthFailureLimiter::new(
        config.auth_max_failures(),
        config.auth_failure_window_secs(),
    ));

    // The sweep ends once the router (and with it the limiter) is dropped
    let limiter_for_cleanup = Arc::downgrade(&limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(AUTH_LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let Some(limiter) = limiter_for_cleanup.upgrade() else {
                break;
            };
            let cleaned = limiter.cleanup_expired().await;
            if cleaned > 0 {
                tracing::debug!(entries_cleaned = cleaned, "Cleaned up expired auth failure entries");
            }
        }
    });

    tracing::info!(
        trusted_proxy_networks = config.trusted_proxy_networks().len(),
        trusted_proxy_count = config.trusted_proxy_count(),
        "Auth failure limiter enabled with periodic cleanup"
    );

    AuthState {
        authenticator: state.authenticator.clone(),
        auth_failure_limiter: Some(limiter),
        trusted_proxies: TrustedProxies::new(
            config.trusted_proxy_networks().to_vec(),
            config.trusted_proxy_count(),
        ),
    }
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(OPENAPI_PATH, get(|| async { Json(api_doc::openapi_spec()) }))
}

/// Every `/api/{tenant_id}/{service}/...` request, whatever the method.
fn gateway_routes() -> Router<Arc<AppState>> {
    Router::new().route(&format!("{}/{{*path}}", API_PREFIX), any(dispatcher::dispatch))
}
