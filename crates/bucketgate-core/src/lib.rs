//! Bucketgate Core Library
//!
//! Domain models, error types and configuration shared by every bucketgate crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{GatewayConfig, ProxySettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{BackendKind, ControlPlaneTarget, Identity, TenantBackendConfig, TenantId};
