//! Bucketgate Database Layer
//!
//! Collaborators consumed by the request path: tenant backend configuration lookup
//! and the activity log. Each has a PostgreSQL repository and an in-memory
//! implementation for local runs and tests.

pub mod db;
pub mod traits;

// Re-exports: repositories
pub use db::{
    ActivityRepository, InMemoryActivityLog, InMemoryTenantConfigStore, TenantConfigRepository,
};

// Re-exports: collaborator traits
pub use traits::{ActivityRecorder, TenantConfigStore};
