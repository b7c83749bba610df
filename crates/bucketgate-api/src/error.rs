//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors
//! (`AppError`, `StorageError`, JSON rejections) convert into `HttpAppError`
//! with `?` and all render through the same body, status and logging path.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bucketgate_core::{AppError, ErrorMetadata, LogLevel};
use bucketgate_storage::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP reason phrase (e.g. "Not Found")
    pub error: String,
    pub message: String,
    pub status: u16,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from bucketgate-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::UploadFailed(msg) => AppError::Upstream(msg),
            StorageError::DeleteFailed(msg) => AppError::Upstream(msg),
            StorageError::BackendError(msg) => AppError::Upstream(msg),
            StorageError::Timeout(msg) => AppError::UpstreamTimeout(msg),
            StorageError::InvalidRequest(msg) => AppError::InvalidInput(msg),
            StorageError::OverrideRejected(msg) => AppError::CredentialOverrideRejected(msg),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        };
        HttpAppError(app)
    }
}

/// JSON body extractor that deserializes, then runs the body's `validator` rules.
///
/// Both failures render as a 400 in the ErrorResponse format, before any
/// upstream call is attempted.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        inner.validate().map_err(AppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    static PRODUCTION: OnceLock<bool> = OnceLock::new();
    *PRODUCTION.get_or_init(|| {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("APP_ENV"))
            .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
            .unwrap_or(false)
    })
}

impl HttpAppError {
    fn body(&self, status: StatusCode, is_production: bool) -> ErrorResponse {
        let app_error = &self.0;
        // Details only outside production, and never for sensitive errors.
        let details = if is_production || app_error.is_sensitive() {
            None
        } else {
            Some(app_error.detailed_message())
        };

        ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: app_error.client_message(),
            status: status.as_u16(),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
            details,
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(&self.0);

        let body = self.body(status, is_production_env());
        let mut response = (status, Json(body)).into_response();

        if let AppError::MethodNotAllowed { allowed, .. } = &self.0 {
            if let Ok(value) = HeaderValue::from_str(allowed) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_storage_error_backend() {
        let HttpAppError(app_err) =
            StorageError::BackendError("NoSuchBucket: missing".to_string()).into();
        match app_err {
            AppError::Upstream(msg) => assert_eq!(msg, "NoSuchBucket: missing"),
            _ => panic!("Expected Upstream variant"),
        }
    }

    #[test]
    fn test_from_storage_error_timeout() {
        let HttpAppError(app_err) = StorageError::Timeout("slow".to_string()).into();
        assert!(matches!(app_err, AppError::UpstreamTimeout(_)));
    }

    #[test]
    fn test_from_storage_error_override_rejected() {
        let HttpAppError(app_err) = StorageError::OverrideRejected("no".to_string()).into();
        assert_eq!(app_err.http_status_code(), 400);
        assert_eq!(app_err.error_code(), "CREDENTIAL_OVERRIDE_REJECTED");
    }

    #[test]
    fn test_from_storage_error_invalid_request() {
        let HttpAppError(app_err) = StorageError::InvalidRequest("bucket is required".into()).into();
        match app_err {
            AppError::InvalidInput(msg) => assert_eq!(msg, "bucket is required"),
            _ => panic!("Expected InvalidInput variant"),
        }
    }

    #[test]
    fn test_error_response_shape() {
        let err = HttpAppError(AppError::TenantNotFound);
        let body = err.body(StatusCode::NOT_FOUND, false);
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["error"], "Not Found");
        assert_eq!(json["message"], "Project not found");
        assert_eq!(json["status"], 404);
        assert_eq!(json["code"], "TENANT_NOT_FOUND");
        assert_eq!(json["recoverable"], false);
    }

    #[test]
    fn test_sensitive_error_hides_details() {
        let err = HttpAppError(AppError::Internal("connection string leaked".to_string()));
        let body = err.body(StatusCode::INTERNAL_SERVER_ERROR, false);
        assert!(body.details.is_none());
        assert_eq!(body.message, "Internal server error");
    }

    #[test]
    fn test_production_hides_details() {
        let err = HttpAppError(AppError::InvalidInput("bad".to_string()));
        assert!(err.body(StatusCode::BAD_REQUEST, false).details.is_some());
        assert!(err.body(StatusCode::BAD_REQUEST, true).details.is_none());
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response = HttpAppError(AppError::MethodNotAllowed {
            method: "DELETE".to_string(),
            allowed: "GET, POST".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, POST");
    }
}
