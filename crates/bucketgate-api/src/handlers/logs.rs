//! Activity log listing (`GET /api/{tenant_id}/logs`).

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::extract::{Query, Request};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bucketgate_core::constants::{DEFAULT_LOG_PAGE_SIZE, MAX_LOG_PAGE_SIZE};
use bucketgate_core::models::ActivityPage;
use bucketgate_core::{AppError, TenantId};
use serde::Deserialize;

/// Raw pagination parameters. Kept as strings so that junk values fall back
/// to the defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
struct LogsQuery {
    page: Option<String>,
    limit: Option<String>,
}

fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|page| *page >= 1)
        .map(|page| page.min(u32::MAX as i64) as u32)
        .unwrap_or(1)
}

fn parse_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|limit| *limit >= 1)
        .map(|limit| limit.min(MAX_LOG_PAGE_SIZE as i64) as u32)
        .unwrap_or(DEFAULT_LOG_PAGE_SIZE)
}

/// List the tenant's activity records, newest first
#[utoipa::path(
    get,
    path = "/api/{project_id}/logs",
    tag = "activity",
    params(
        ("project_id" = i64, Path, description = "Tenant id"),
        ("page" = Option<u32>, Query, description = "1-based page number (default 1)"),
        ("limit" = Option<u32>, Query, description = "Page size (default 50, max 100)")
    ),
    responses(
        (status = 200, description = "Activity page", body = ActivityPage),
        (status = 404, description = "Tenant not found", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_logs(
    state: &AppState,
    tenant_id: TenantId,
    request: Request,
) -> Result<Response, HttpAppError> {
    if request.method() != Method::GET {
        return Err(AppError::MethodNotAllowed {
            method: request.method().to_string(),
            allowed: "GET".to_string(),
        }
        .into());
    }

    let query = Query::<LogsQuery>::try_from_uri(request.uri())
        .map(|Query(query)| query)
        .unwrap_or_default();
    let page = parse_page(query.page.as_deref());
    let limit = parse_limit(query.limit.as_deref());

    let (logs, total) = state.activity.list(tenant_id, page, limit).await?;

    Ok(Json(ActivityPage {
        logs,
        total,
        page,
        limit,
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_floor() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-4")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("3")), 3);
    }

    #[test]
    fn test_limit_defaults_and_cap() {
        assert_eq!(parse_limit(None), 50);
        assert_eq!(parse_limit(Some("0")), 50);
        assert_eq!(parse_limit(Some("x")), 50);
        assert_eq!(parse_limit(Some("20")), 20);
        assert_eq!(parse_limit(Some("500")), 100);
    }
}
