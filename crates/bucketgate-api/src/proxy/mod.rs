//! Control-plane reverse proxy
//!
//! Requests under `/api/{tenant_id}/v{N}/...` are replayed against the tenant's
//! administrative endpoint with the mount prefix removed and the caller's
//! bearer swapped for the tenant's admin token.

mod forwarder;
pub mod headers;
pub mod path;

pub use forwarder::{ControlPlaneForwarder, ForwardTarget};
pub use path::{single_join, strip_mount_prefix};
