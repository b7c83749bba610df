use crate::auth::jwt::Authenticator;
use crate::error::HttpAppError;
use crate::utils::ip_extraction::TrustedProxies;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use bucketgate_core::AppError;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const BEARER_PREFIX: &str = "Bearer ";
/// Tracked clients before `record_failure` sweeps expired entries inline.
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Clone)]
pub struct AuthFailureLimiter {
    inner: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
}

impl AuthFailureLimiter {
    pub fn new(max_failures: u32, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window: Duration::from_secs(window_seconds),
        }
    }

    pub async fn record_failure(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        if guard.len() >= MAX_TRACKED_CLIENTS && !guard.contains_key(ip) {
            guard.retain(|_, (_, reset_at)| *reset_at > now);
        }
        let (count, reset_at) = guard.entry(ip.to_string()).or_insert((0, now + self.window));
        if now >= *reset_at {
            *count = 0;
            *reset_at = now + self.window;
        }
        *count += 1;
        *count >= self.max_failures
    }

    pub async fn is_blocked(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        if let Some((count, reset_at)) = guard.get(ip) {
            if Instant::now() >= *reset_at {
                guard.remove(ip);
                return false;
            }
            return *count >= self.max_failures;
        }
        false
    }

    /// Drop every entry whose window has elapsed. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let before = guard.len();
        guard.retain(|_, (_, reset_at)| *reset_at > now);
        before - guard.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<dyn Authenticator>,
    pub auth_failure_limiter: Option<Arc<AuthFailureLimiter>>,
    pub trusted_proxies: TrustedProxies,
}

fn too_many_attempts() -> Response {
    HttpAppError(AppError::TooManyRequests(
        "Too many failed authentication attempts".to_string(),
    ))
    .into_response()
}

/// Record a failure for `client_ip` and render either the 401 or, once the
/// limit is hit, the 429.
async fn reject(auth_state: &AuthState, client_ip: &str, message: &str) -> Response {
    if let Some(ref limiter) = auth_state.auth_failure_limiter {
        if limiter.record_failure(client_ip).await {
            tracing::warn!(client_ip = %client_ip, "Authentication failure limit reached");
            return too_many_attempts();
        }
    }
    tracing::debug!(client_ip = %client_ip, reason = %message, "Authentication failed");
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let origin = auth_state.trusted_proxies.origin(
        request.headers(),
        request.uri(),
        socket_addr.as_ref(),
    );
    let client_ip = origin.ip.clone();

    if let Some(ref limiter) = auth_state.auth_failure_limiter {
        if limiter.is_blocked(&client_ip).await {
            return too_many_attempts();
        }
    }

    let auth_header = match request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => return reject(&auth_state, &client_ip, "Missing authorization header").await,
    };

    let token = match auth_header.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.trim().is_empty() => token.trim(),
        _ => {
            return reject(
                &auth_state,
                &client_ip,
                "Invalid authorization header format",
            )
            .await
        }
    };

    let identity = match auth_state.authenticator.authenticate(token) {
        Ok(identity) => identity,
        Err(AppError::Unauthorized(msg)) => return reject(&auth_state, &client_ip, &msg).await,
        Err(e) => return HttpAppError(e).into_response(),
    };

    tracing::debug!(
        user_id = identity.user_id,
        username = %identity.username,
        client_ip = %client_ip,
        "Authenticated request"
    );

    request.extensions_mut().insert(origin);
    request.extensions_mut().insert(identity);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limiter_blocks_after_max_failures() {
        let limiter = AuthFailureLimiter::new(3, 60);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.1").await);
        assert!(limiter.record_failure("10.0.0.1").await);
        assert!(limiter.is_blocked("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_limiter_window_rolls_over() {
        let limiter = AuthFailureLimiter::new(1, 0);
        limiter.record_failure("10.0.0.1").await;
        assert!(!limiter.is_blocked("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_entries() {
        let limiter = AuthFailureLimiter::new(5, 0);
        for i in 0..20 {
            limiter.record_failure(&format!("198.51.100.{}", i)).await;
        }
        assert_eq!(limiter.tracked_clients().await, 20);
        assert_eq!(limiter.cleanup_expired().await, 20);
        assert_eq!(limiter.tracked_clients().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_windows() {
        let limiter = AuthFailureLimiter::new(5, 60);
        limiter.record_failure("10.0.0.1").await;
        assert_eq!(limiter.cleanup_expired().await, 0);
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[tokio::test]
    async fn test_too_many_attempts_renders_json_error() {
        let response = too_many_attempts();
        assert_eq!(response.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 429);
        assert_eq!(body["code"], "TOO_MANY_REQUESTS");
        assert_eq!(body["error"], "Too Many Requests");
    }
}
