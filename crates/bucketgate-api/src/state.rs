//! Application state shared by every request.
//!
//! Collaborators are held behind traits so the same router runs against
//! PostgreSQL and aws-sdk-s3 in production and in-memory doubles in tests.
//! Nothing in here is mutated per request.

use crate::auth::Authenticator;
use crate::proxy::ControlPlaneForwarder;
use bucketgate_core::GatewayConfig;
use bucketgate_db::{ActivityRecorder, TenantConfigStore};
use bucketgate_storage::ClientFactory;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub tenants: Arc<dyn TenantConfigStore>,
    pub activity: Arc<dyn ActivityRecorder>,
    pub clients: Arc<dyn ClientFactory>,
    pub forwarder: ControlPlaneForwarder,
    pub authenticator: Arc<dyn Authenticator>,
}
