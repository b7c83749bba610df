//! Repository implementations
//
// PostgreSQL repositories
pub mod activity;
pub mod tenant_config;
//
// In-memory implementations
pub mod memory;

pub use activity::ActivityRepository;
pub use memory::{InMemoryActivityLog, InMemoryTenantConfigStore};
pub use tenant_config::TenantConfigRepository;
