//! Request dispatcher
//!
//! Every authenticated `/api/{tenant_id}/{service}/...` request funnels through
//! [`dispatch`]: the path is parsed, the tenant's backend configuration is
//! resolved for the caller, and the service marker picks the data-plane
//! handlers, the control-plane forwarder or the activity log.
//!
//! Service and operation markers are closed enums. The operation table is
//! checked once at start-up by [`validate_dispatch_table`].

use crate::auth::AuthenticatedUser;
use crate::error::HttpAppError;
use crate::handlers;
use crate::proxy::ForwardTarget;
use crate::state::AppState;
use crate::utils::ip_extraction::ClientOrigin;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::response::Response;
use bucketgate_core::constants::{
    ACTIVITY_LOG_MARKER, API_PREFIX, CONTROL_PLANE_MARKER_PREFIX, DATA_PLANE_MARKER,
};
use bucketgate_core::{AppError, TenantId};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

/// Service selected by the first segment after the tenant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// `s3`
    DataPlane,
    /// `v1`, `v2`, ...
    ControlPlane,
    /// `logs`
    ActivityLog,
}

impl Service {
    pub fn from_marker(marker: &str) -> Option<Self> {
        if marker == DATA_PLANE_MARKER {
            Some(Service::DataPlane)
        } else if marker == ACTIVITY_LOG_MARKER {
            Some(Service::ActivityLog)
        } else if is_control_plane_marker(marker) {
            Some(Service::ControlPlane)
        } else {
            None
        }
    }
}

fn is_control_plane_marker(marker: &str) -> bool {
    marker
        .strip_prefix(CONTROL_PLANE_MARKER_PREFIX)
        .is_some_and(|version| !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()))
}

/// Data-plane operation selected by the segment after `s3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    ListObjects,
    GetObject,
    PutObject,
    DeleteObject,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::ListBuckets,
        Operation::CreateBucket,
        Operation::DeleteBucket,
        Operation::ListObjects,
        Operation::GetObject,
        Operation::PutObject,
        Operation::DeleteObject,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            Operation::ListBuckets => "list-buckets",
            Operation::CreateBucket => "create-bucket",
            Operation::DeleteBucket => "delete-bucket",
            Operation::ListObjects => "list-objects",
            Operation::GetObject => "get-object",
            Operation::PutObject => "put-object",
            Operation::DeleteObject => "delete-object",
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.marker() == marker)
    }

    /// Value of the `Allow` header for this operation.
    pub fn allowed_methods(self) -> &'static str {
        match self {
            Operation::ListBuckets => "GET, POST",
            _ => "POST",
        }
    }

    pub fn allows(self, method: &Method) -> bool {
        match self {
            Operation::ListBuckets => method == Method::GET || method == Method::POST,
            _ => method == Method::POST,
        }
    }
}

/// Check the operation table: unique, non-empty markers that cannot be
/// confused with a service marker, and parseable `Allow` values.
pub fn validate_dispatch_table() -> Result<(), anyhow::Error> {
    let mut seen = HashSet::new();

    for op in Operation::ALL {
        let marker = op.marker();
        if marker.is_empty() || marker.contains('/') {
            return Err(anyhow::anyhow!("Invalid operation marker {:?}", marker));
        }
        if !seen.insert(marker) {
            return Err(anyhow::anyhow!("Duplicate operation marker {:?}", marker));
        }
        if Service::from_marker(marker).is_some() {
            return Err(anyhow::anyhow!(
                "Operation marker {:?} collides with a service marker",
                marker
            ));
        }
        if Operation::from_marker(marker) != Some(op) {
            return Err(anyhow::anyhow!("Operation marker {:?} does not round-trip", marker));
        }
        for method in op.allowed_methods().split(',') {
            let method: Method = method
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid method for {:?}: {}", marker, e))?;
            if !op.allows(&method) {
                return Err(anyhow::anyhow!(
                    "Allow header of {:?} lists {} but the operation rejects it",
                    marker,
                    method
                ));
            }
        }
    }

    tracing::debug!(operations = seen.len(), "Dispatch table validated");
    Ok(())
}

/// Inbound path split into tenant and remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPath<'a> {
    pub tenant_id: TenantId,
    /// Tenant segment exactly as received.
    pub tenant_segment: &'a str,
    /// Everything after the tenant segment, without leading or trailing `/`.
    pub rest: &'a str,
}

impl<'a> GatewayPath<'a> {
    pub fn parse(path: &'a str) -> Result<Self, AppError> {
        let relative = path
            .strip_prefix(API_PREFIX)
            .unwrap_or(path)
            .trim_start_matches('/');

        let (tenant_segment, rest) = relative.split_once('/').ok_or_else(|| {
            AppError::MalformedPath("Expected /api/{project_id}/{service}/...".to_string())
        })?;
        let rest = rest.trim_matches('/');
        if tenant_segment.is_empty() || rest.is_empty() {
            return Err(AppError::MalformedPath(
                "Expected /api/{project_id}/{service}/...".to_string(),
            ));
        }

        let tenant_id = tenant_segment
            .parse::<TenantId>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                AppError::MalformedPath(format!("Invalid project ID: {}", tenant_segment))
            })?;

        Ok(Self {
            tenant_id,
            tenant_segment,
            rest,
        })
    }

    pub fn service_marker(&self) -> &'a str {
        self.rest.split('/').next().unwrap_or_default()
    }

    /// Remainder after the service marker (the operation for data-plane calls).
    pub fn operation_marker(&self) -> &'a str {
        self.rest
            .split_once('/')
            .map(|(_, operation)| operation)
            .unwrap_or_default()
    }

    pub fn mount_prefix(&self) -> String {
        format!("{}/{}", API_PREFIX, self.tenant_segment)
    }
}

/// Entry point for every tenant-scoped request.
#[axum::debug_handler]
#[tracing::instrument(
    skip_all,
    fields(
        request_id = tracing::field::Empty,
        tenant_id = tracing::field::Empty,
        user_id = tracing::field::Empty,
        service = tracing::field::Empty
    )
)]
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(identity): AuthenticatedUser,
    request: Request,
) -> Result<Response, HttpAppError> {
    let path = request.uri().path().to_string();
    let gateway_path = GatewayPath::parse(&path)?;

    let span = tracing::Span::current();
    if let Some(request_id) = bucketgate_infra::get_request_id(&request) {
        span.record("request_id", request_id.as_str());
    }
    span.record("tenant_id", gateway_path.tenant_id);
    span.record("user_id", identity.user_id);

    let tenant = state
        .tenants
        .resolve(gateway_path.tenant_id, &identity)
        .await?
        .ok_or(AppError::TenantNotFound)?;

    let marker = gateway_path.service_marker();
    let service = Service::from_marker(marker)
        .ok_or_else(|| AppError::UnknownService(marker.to_string()))?;
    span.record("service", marker);

    match service {
        Service::DataPlane => {
            let operation_marker = gateway_path.operation_marker();
            let operation = Operation::from_marker(operation_marker)
                .ok_or_else(|| AppError::UnknownOperation(operation_marker.to_string()))?;
            if !operation.allows(request.method()) {
                return Err(AppError::MethodNotAllowed {
                    method: request.method().to_string(),
                    allowed: operation.allowed_methods().to_string(),
                }
                .into());
            }

            let context = handlers::storage::TenantRequest { tenant, identity };
            handlers::storage::handle(&state, &context, operation, request).await
        }
        Service::ControlPlane => {
            let control_plane = tenant.control_plane()?;
            let origin = client_origin(&request);
            let client_ip = forwarded_for_hop(&request, &origin);
            let mount_prefix = gateway_path.mount_prefix();

            state
                .forwarder
                .forward(
                    ForwardTarget {
                        tenant_id: tenant.id,
                        mount_prefix: &mount_prefix,
                        control_plane: &control_plane,
                        client_ip: &client_ip,
                        forwarded_host: origin.host.as_deref(),
                        forwarded_proto: &origin.proto,
                    },
                    request,
                )
                .await
        }
        Service::ActivityLog => handlers::logs::list_logs(&state, tenant.id, request).await,
    }
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Origin the auth middleware derived, or the bare request facts when the
/// middleware did not run.
fn client_origin(request: &Request) -> ClientOrigin {
    request
        .extensions()
        .get::<ClientOrigin>()
        .cloned()
        .unwrap_or_else(|| {
            ClientOrigin::direct(request.headers(), request.uri(), peer_addr(request).as_ref())
        })
}

/// Address appended to the upstream `X-Forwarded-For` chain: the socket peer
/// when known, otherwise the derived client IP.
fn forwarded_for_hop(request: &Request, origin: &ClientOrigin) -> String {
    peer_addr(request)
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| origin.ip.clone())
}
