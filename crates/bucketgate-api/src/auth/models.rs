use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use bucketgate_core::{AppError, Identity};
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub user_id: i64,
    pub username: String,
    pub role: String, // "admin" or "user"
    pub exp: usize,   // expiration timestamp
}

/// Verified caller, placed in request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

// Extract directly from request parts so the extractor composes with a body extractor
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing authenticated identity".to_string(),
                ))
            })
    }
}
