//! Header rewriting for forwarded control-plane requests and their responses.

use axum::http::header::{AUTHORIZATION, CONNECTION, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use bucketgate_core::AppError;

/// Headers meaningful for a single transport hop only.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Header names listed in `Connection`, lowercased.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Copy of `headers` without hop-by-hop headers or anything `Connection` names.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed = connection_tokens(headers);
    let mut out = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        let name_str = name.as_str();
        if HOP_BY_HOP_HEADERS.contains(&name_str) || listed.iter().any(|t| t == name_str) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out
}

/// Inbound facts captured before the request is rewritten.
#[derive(Debug, Clone)]
pub struct ForwardedContext<'a> {
    /// Address appended to the `X-Forwarded-For` chain.
    pub client_ip: &'a str,
    /// Host the caller addressed; inbound `Host` or URI authority, or a
    /// trusted proxy's `X-Forwarded-Host`.
    pub host: Option<&'a str>,
    /// Scheme the caller used to reach the gateway.
    pub scheme: &'a str,
    /// Stored admin service token of the tenant.
    pub admin_token: Option<&'a str>,
}

/// Build the outbound header set.
///
/// `Host` is dropped so the client derives it from the target URL. The
/// caller's `Authorization` never survives: it is replaced by the admin token,
/// or removed when the tenant has none.
pub fn outbound_headers(
    inbound: &HeaderMap,
    context: &ForwardedContext<'_>,
) -> Result<HeaderMap, AppError> {
    let mut headers = strip_hop_by_hop(inbound);
    headers.remove(HOST);
    headers.remove(AUTHORIZATION);

    if let Some(token) = context.admin_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            AppError::InconsistentTenantConfig(
                "admin token contains characters not allowed in a header".to_string(),
            )
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let prior: Vec<&str> = inbound
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    let chain = if prior.is_empty() {
        context.client_ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), context.client_ip)
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }

    headers.remove(&X_FORWARDED_HOST);
    headers.remove(&X_FORWARDED_PROTO);
    if let Some(value) = context.host.and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert(X_FORWARDED_HOST.clone(), value);
    }
    if let Ok(value) = HeaderValue::from_str(context.scheme) {
        headers.insert(X_FORWARDED_PROTO.clone(), value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("gateway.example.com"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer caller-jwt"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-trace-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace-hop", HeaderValue::from_static("1"));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers
    }

    fn context(admin_token: Option<&str>) -> ForwardedContext<'_> {
        ForwardedContext {
            client_ip: "203.0.113.7",
            host: Some("gateway.example.com"),
            scheme: "http",
            admin_token,
        }
    }

    #[test]
    fn test_strip_hop_by_hop_drops_connection_listed_headers() {
        let stripped = strip_hop_by_hop(&inbound());
        assert!(stripped.get(CONNECTION).is_none());
        assert!(stripped.get("keep-alive").is_none());
        assert!(stripped.get("x-trace-hop").is_none());
        assert_eq!(stripped.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn test_admin_token_replaces_caller_bearer() {
        let headers = outbound_headers(&inbound(), &context(Some("admin-token"))).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer admin-token");
        assert!(headers.get(HOST).is_none());
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "gateway.example.com");
        assert_eq!(headers.get("x-forwarded-proto").unwrap(), "http");
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "203.0.113.7");
    }

    #[test]
    fn test_caller_bearer_removed_without_admin_token() {
        let headers = outbound_headers(&inbound(), &context(None)).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_forwarded_for_chain_is_extended() {
        let mut headers = inbound();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));
        let out = outbound_headers(&headers, &context(None)).unwrap();
        assert_eq!(
            out.get("x-forwarded-for").unwrap(),
            "198.51.100.1, 203.0.113.7"
        );
    }

    #[test]
    fn test_forwarded_host_and_proto_come_from_context() {
        let mut headers = inbound();
        headers.insert("x-forwarded-host", HeaderValue::from_static("forged.example.net"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("gopher"));
        let ctx = ForwardedContext {
            client_ip: "203.0.113.7",
            host: Some("public.example.com"),
            scheme: "https",
            admin_token: None,
        };
        let out = outbound_headers(&headers, &ctx).unwrap();
        assert_eq!(out.get("x-forwarded-host").unwrap(), "public.example.com");
        assert_eq!(out.get_all("x-forwarded-host").iter().count(), 1);
        assert_eq!(out.get("x-forwarded-proto").unwrap(), "https");
    }

    #[test]
    fn test_inbound_forwarded_host_dropped_without_known_host() {
        let mut headers = inbound();
        headers.insert("x-forwarded-host", HeaderValue::from_static("forged.example.net"));
        let ctx = ForwardedContext {
            host: None,
            ..context(None)
        };
        let out = outbound_headers(&headers, &ctx).unwrap();
        assert!(out.get("x-forwarded-host").is_none());
    }
}
