pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::{Authenticator, JwtAuthenticator};
pub use models::{AuthenticatedUser, JwtClaims};
