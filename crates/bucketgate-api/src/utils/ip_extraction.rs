//! Client origin derivation
//!
//! The gateway may sit behind load balancers. Forwarding headers
//! (`X-Forwarded-For`, `X-Real-IP`, `X-Forwarded-Host`, `X-Forwarded-Proto`)
//! are only believed when the socket peer belongs to a trusted proxy network;
//! anyone else is described by the connection itself.

use axum::http::{header, HeaderMap, Uri};
use ipnetwork::IpNetwork;
use std::net::{IpAddr, SocketAddr};

const UNKNOWN: &str = "unknown";

/// Where a request came from, stored in request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOrigin {
    /// Best-effort client IP; also the key of the auth failure limiter.
    pub ip: String,
    /// Host the caller addressed.
    pub host: Option<String>,
    /// Scheme the caller used (`http` or `https`).
    pub proto: String,
}

impl ClientOrigin {
    /// Origin as seen on the connection, ignoring forwarding headers.
    pub fn direct(headers: &HeaderMap, uri: &Uri, peer: Option<&SocketAddr>) -> Self {
        Self {
            ip: peer
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            host: request_host(headers, uri),
            proto: uri.scheme_str().unwrap_or("http").to_string(),
        }
    }
}

/// Proxies allowed to speak for the client.
#[derive(Debug, Clone)]
pub struct TrustedProxies {
    networks: Vec<IpNetwork>,
    /// Number of trusted hops at the end of `X-Forwarded-For`.
    hop_count: usize,
}

impl TrustedProxies {
    pub fn new(networks: Vec<IpNetwork>, hop_count: usize) -> Self {
        Self {
            networks,
            hop_count,
        }
    }

    pub fn is_trusted(&self, peer: &SocketAddr) -> bool {
        self.networks
            .iter()
            .any(|network| network.contains(peer.ip()))
    }

    /// Resolve the client origin. A request without a known socket peer is
    /// treated as untrusted.
    pub fn origin(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
        peer: Option<&SocketAddr>,
    ) -> ClientOrigin {
        let direct = ClientOrigin::direct(headers, uri, peer);
        let Some(peer) = peer.filter(|peer| self.is_trusted(peer)) else {
            return direct;
        };

        let forwarded_ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| from_forwarded_chain(v, self.hop_count));
        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| is_valid_ip(v))
                .map(str::to_string)
        };

        ClientOrigin {
            ip: forwarded_ip
                .or_else(real_ip)
                .unwrap_or_else(|| peer.ip().to_string()),
            host: first_value(headers, "x-forwarded-host").or(direct.host),
            proto: first_value(headers, "x-forwarded-proto")
                .map(|proto| proto.to_ascii_lowercase())
                .filter(|proto| proto == "http" || proto == "https")
                .unwrap_or(direct.proto),
        }
    }
}

/// `Host` header, or the URI authority (HTTP/2 `:authority`).
fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|authority| authority.as_str().to_string()))
}

/// First comma-separated entry of a header.
fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Pick the entry just before the trusted proxies at the end of the chain.
///
/// With no trusted hops, or a chain no longer than the trusted count, the
/// last (closest) hop is used.
fn from_forwarded_chain(header_value: &str, trusted_hops: usize) -> Option<String> {
    let hops: Vec<&str> = header_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_hops == 0 || hops.len() <= trusted_hops {
        hops.last()?
    } else {
        hops.get(hops.len() - trusted_hops - 1)?
    };

    is_valid_ip(candidate).then(|| candidate.to_string())
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}
