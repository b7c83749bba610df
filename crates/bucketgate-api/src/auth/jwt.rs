//! HS256 bearer token verification
//!
//! Tokens are issued elsewhere; the gateway only verifies them. The signing
//! secret is handed over at construction and never re-read from the environment.

use crate::auth::models::JwtClaims;
use bucketgate_core::{AppError, Identity};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

/// Turns a bearer credential into a verified identity.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Identity, AppError>;
}

/// Shared-secret JWT verifier
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Identity, AppError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
                _ => AppError::Unauthorized(format!("Invalid token: {}", e)),
            },
        )?;

        let claims = data.claims;
        Ok(Identity::new(claims.user_id, claims.username, claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "an-hs256-secret-of-at-least-32-characters";

    fn token(secret: &str, exp_offset_secs: i64) -> String {
        let claims = JwtClaims {
            user_id: 42,
            username: "alice".to_string(),
            role: "user".to_string(),
            exp: (now_secs() + exp_offset_secs) as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn now_secs() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let auth = JwtAuthenticator::new(SECRET);
        let identity = auth.authenticate(&token(SECRET, 3600)).unwrap();
        assert_eq!(identity, Identity::new(42, "alice", "user"));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let auth = JwtAuthenticator::new(SECRET);
        let err = auth.authenticate(&token(SECRET, -60)).unwrap_err();
        match err {
            AppError::Unauthorized(msg) => assert_eq!(msg, "Token expired"),
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let auth = JwtAuthenticator::new(SECRET);
        let forged = token("some-other-secret-that-is-long-enough!!", 3600);
        assert!(matches!(
            auth.authenticate(&forged),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_garbage_token_is_unauthorized() {
        let auth = JwtAuthenticator::new(SECRET);
        assert!(matches!(
            auth.authenticate("not.a.jwt"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
