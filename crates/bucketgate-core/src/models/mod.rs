//! Data models for the gateway
//!
//! Tenant backend configuration and caller identity are consumed read-only by the
//! request path; `storage` holds the JSON wire types of the data-plane routes.

mod activity;
mod identity;
pub mod storage;
mod tenant;

pub use activity::*;
pub use identity::*;
pub use tenant::*;
