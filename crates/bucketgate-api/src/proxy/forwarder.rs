use crate::error::HttpAppError;
use crate::proxy::headers::{outbound_headers, strip_hop_by_hop, ForwardedContext};
use crate::proxy::path::upstream_url;
use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::response::Response;
use bucketgate_core::{AppError, ControlPlaneTarget, ProxySettings, TenantId};
use std::time::Instant;

/// Reverse proxy towards tenants' administrative endpoints.
///
/// One pooled HTTP client is shared by all tenants. Requests are never
/// retried and redirects are handed back to the caller untouched.
#[derive(Clone)]
pub struct ControlPlaneForwarder {
    client: reqwest::Client,
}

/// Where and on whose behalf a request is forwarded.
#[derive(Debug)]
pub struct ForwardTarget<'a> {
    pub tenant_id: TenantId,
    /// Gateway mount of the tenant, e.g. `/api/7`
    pub mount_prefix: &'a str,
    pub control_plane: &'a ControlPlaneTarget,
    /// Hop appended to `X-Forwarded-For`.
    pub client_ip: &'a str,
    /// Host the caller addressed, for `X-Forwarded-Host`.
    pub forwarded_host: Option<&'a str>,
    /// Scheme the caller used, for `X-Forwarded-Proto`.
    pub forwarded_proto: &'a str,
}

impl ControlPlaneForwarder {
    pub fn new(settings: &ProxySettings) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .pool_idle_timeout(settings.pool_idle_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build control-plane HTTP client: {}", e))?;

        tracing::info!(
            connect_timeout_ms = settings.connect_timeout.as_millis() as u64,
            timeout_ms = settings.timeout.as_millis() as u64,
            pool_idle_timeout_secs = settings.pool_idle_timeout.as_secs(),
            accept_invalid_certs = settings.accept_invalid_certs,
            "Control-plane forwarder initialized"
        );

        Ok(Self { client })
    }

    /// Forward `request` and relay the upstream status, headers and body.
    pub async fn forward(
        &self,
        target: ForwardTarget<'_>,
        request: Request,
    ) -> Result<Response, HttpAppError> {
        let start = Instant::now();
        let (parts, body) = request.into_parts();

        let url = upstream_url(
            &target.control_plane.endpoint,
            target.mount_prefix,
            parts.uri.path(),
            parts.uri.query(),
        )?;
        let headers = outbound_headers(
            &parts.headers,
            &ForwardedContext {
                client_ip: target.client_ip,
                host: target.forwarded_host,
                scheme: target.forwarded_proto,
                admin_token: target.control_plane.token.as_deref(),
            },
        )?;

        let mut outbound = self
            .client
            .request(parts.method.clone(), url.clone())
            .headers(headers);
        if carries_body(&body) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = match outbound.send().await {
            Ok(response) => response,
            Err(e) => {
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                tracing::warn!(
                    tenant_id = target.tenant_id,
                    method = %parts.method,
                    upstream = %url,
                    error = %e,
                    duration_ms,
                    "Control-plane request failed"
                );
                return Err(upstream_error(&e).into());
            }
        };

        let status = upstream.status();
        tracing::info!(
            tenant_id = target.tenant_id,
            method = %parts.method,
            upstream = %url,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Control-plane request forwarded"
        );

        let headers = strip_hop_by_hop(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Whether anything remains to be read from the inbound body. Headers are not
/// consulted: HTTP/2 bodies have neither `Transfer-Encoding` nor, when
/// streamed, `Content-Length`.
fn carries_body(body: &Body) -> bool {
    !body.is_end_stream()
}

fn upstream_error(err: &reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::UpstreamTimeout("Admin API did not respond in time".to_string())
    } else if err.is_connect() {
        AppError::Upstream(format!("Admin API unreachable: {}", err))
    } else {
        AppError::Upstream(format!("Admin API request failed: {}", err))
    }
}
