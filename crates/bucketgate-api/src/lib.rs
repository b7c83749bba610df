//! Bucketgate API Library
//!
//! HTTP surface of the gateway: authentication, the request dispatcher, the
//! control-plane reverse proxy, data-plane handlers and application setup.

mod api_doc;
pub mod constants;
pub mod dispatcher;
mod handlers;
pub mod proxy;
pub mod setup;
mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
