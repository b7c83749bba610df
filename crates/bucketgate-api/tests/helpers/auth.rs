use super::JWT_SECRET;
use bucketgate_api::auth::JwtClaims;
use jsonwebtoken::{encode, EncodingKey, Header};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as usize
}

/// Signed HS256 token for `user_id`, valid for an hour
pub fn token_for(user_id: i64) -> String {
    sign(user_id, now_secs() + 3600)
}

/// Token that expired a minute ago
pub fn expired_token_for(user_id: i64) -> String {
    sign(user_id, now_secs() - 60)
}

fn sign(user_id: i64, exp: usize) -> String {
    let claims = JwtClaims {
        user_id,
        username: format!("user{}", user_id),
        role: "user".to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

/// `Authorization` header value for `user_id`
pub fn bearer(user_id: i64) -> String {
    format!("Bearer {}", token_for(user_id))
}
