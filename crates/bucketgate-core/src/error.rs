//! Error types module
//!
//! All gateway failures are unified under the `AppError` enum. Every variant
//! describes its own HTTP presentation through the `ErrorMetadata` trait so the
//! rendering layer never has to match on variants itself.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for upstream trouble the caller can retry around
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TENANT_NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed path: {0}")]
    MalformedPath(String),

    #[error("Credential override rejected: {0}")]
    CredentialOverrideRejected(String),

    /// Covers both a missing tenant and a tenant owned by someone else.
    #[error("Project not found")]
    TenantNotFound,

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method {method} not allowed, expected {allowed}")]
    MethodNotAllowed { method: String, allowed: String },

    #[error("Control plane not configured: {0}")]
    ControlPlaneNotConfigured(String),

    #[error("Inconsistent tenant configuration: {0}")]
    InconsistentTenantConfig(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the bearer token"),
            false,
            LogLevel::Debug,
        ),
        AppError::TooManyRequests(_) => (
            429,
            "TOO_MANY_REQUESTS",
            true,
            Some("Wait before retrying"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::MalformedPath(_) => (
            400,
            "MALFORMED_PATH",
            false,
            Some("Use /api/{project_id}/{service}/..."),
            false,
            LogLevel::Debug,
        ),
        AppError::CredentialOverrideRejected(_) => (
            400,
            "CREDENTIAL_OVERRIDE_REJECTED",
            false,
            Some("Omit keyId and token for this project"),
            false,
            LogLevel::Debug,
        ),
        AppError::TenantNotFound => (
            404,
            "TENANT_NOT_FOUND",
            false,
            Some("Verify the project ID"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnknownService(_) => (
            404,
            "UNKNOWN_SERVICE",
            false,
            Some("Use the s3, logs or a versioned admin service"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnknownOperation(_) => (
            404,
            "UNKNOWN_OPERATION",
            false,
            Some("Check the operation name"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::MethodNotAllowed { .. } => (
            405,
            "METHOD_NOT_ALLOWED",
            false,
            Some("Check the HTTP method for this operation"),
            false,
            LogLevel::Debug,
        ),
        AppError::ControlPlaneNotConfigured(_) => (
            400,
            "CONTROL_PLANE_NOT_CONFIGURED",
            false,
            Some("Configure an admin endpoint for this project"),
            false,
            LogLevel::Debug,
        ),
        AppError::InconsistentTenantConfig(_) => (
            500,
            "INCONSISTENT_TENANT_CONFIG",
            false,
            Some("Contact the project administrator"),
            true,
            LogLevel::Error,
        ),
        AppError::Upstream(_) => (
            502,
            "UPSTREAM_ERROR",
            true,
            Some("Check the storage backend and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::UpstreamTimeout(_) => (
            504,
            "UPSTREAM_TIMEOUT",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::TooManyRequests(_) => "TooManyRequests",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::MalformedPath(_) => "MalformedPath",
            AppError::CredentialOverrideRejected(_) => "CredentialOverrideRejected",
            AppError::TenantNotFound => "TenantNotFound",
            AppError::UnknownService(_) => "UnknownService",
            AppError::UnknownOperation(_) => "UnknownOperation",
            AppError::NotFound(_) => "NotFound",
            AppError::MethodNotAllowed { .. } => "MethodNotAllowed",
            AppError::ControlPlaneNotConfigured(_) => "ControlPlaneNotConfigured",
            AppError::InconsistentTenantConfig(_) => "InconsistentTenantConfig",
            AppError::Upstream(_) => "Upstream",
            AppError::UpstreamTimeout(_) => "UpstreamTimeout",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::TooManyRequests(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::MalformedPath(ref msg) => msg.clone(),
            AppError::CredentialOverrideRejected(ref msg) => msg.clone(),
            AppError::TenantNotFound => "Project not found".to_string(),
            AppError::UnknownService(ref service) => format!("Invalid service: {}", service),
            AppError::UnknownOperation(ref op) => format!("Invalid operation: {}", op),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::MethodNotAllowed { method, allowed } => {
                format!("Method {} not allowed, expected {}", method, allowed)
            }
            AppError::ControlPlaneNotConfigured(ref msg) => msg.clone(),
            AppError::InconsistentTenantConfig(_) => {
                "Project backend configuration is inconsistent".to_string()
            }
            AppError::Upstream(ref msg) => msg.clone(),
            AppError::UpstreamTimeout(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
