//! Collaborator wiring for the shared application state

use crate::auth::JwtAuthenticator;
use crate::proxy::ControlPlaneForwarder;
use crate::state::AppState;
use anyhow::Result;
use bucketgate_core::GatewayConfig;
use bucketgate_db::{ActivityRepository, TenantConfigRepository};
use bucketgate_storage::S3ClientFactory;
use sqlx::PgPool;
use std::sync::Arc;

/// Build repositories, the storage client factory, the forwarder and the authenticator
pub async fn initialize_services(config: &GatewayConfig, pool: PgPool) -> Result<Arc<AppState>> {
    let tenants = Arc::new(TenantConfigRepository::new(pool.clone()));
    let activity = Arc::new(ActivityRepository::new(pool));

    let clients = Arc::new(S3ClientFactory::new(config.s3_connect_timeout()).await);
    let forwarder = ControlPlaneForwarder::new(config.proxy())?;
    let authenticator = Arc::new(JwtAuthenticator::new(config.jwt_secret()));

    tracing::info!("Services initialized");

    Ok(Arc::new(AppState {
        config: config.clone(),
        tenants,
        activity,
        clients,
        forwarder,
        authenticator,
    }))
}
