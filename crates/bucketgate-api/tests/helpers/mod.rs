#![allow(dead_code)]

pub mod auth;
pub mod fixtures;

use axum_test::TestServer;
use bucketgate_api::proxy::ControlPlaneForwarder;
use bucketgate_api::setup::routes::setup_routes;
use bucketgate_api::auth::JwtAuthenticator;
use bucketgate_api::AppState;
use bucketgate_core::{GatewayConfig, ProxySettings, TenantBackendConfig};
use bucketgate_db::{InMemoryActivityLog, InMemoryTenantConfigStore};
use bucketgate_storage::{MemoryClientFactory, MemoryObjectStore};
use std::sync::Arc;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Gateway wired to in-memory collaborators
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub tenants: Arc<InMemoryTenantConfigStore>,
    pub activity: Arc<InMemoryActivityLog>,
    pub clients: Arc<MemoryClientFactory>,
}

impl TestApp {
    /// Get the HTTP test client
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Shared object store behind every client the gateway builds
    pub fn store(&self) -> Arc<MemoryObjectStore> {
        self.clients.store()
    }

    /// Wait until the fire-and-forget recorder has caught up.
    pub async fn wait_for_activity(&self, expected: usize) -> Vec<bucketgate_core::models::ActivityRecord> {
        for _ in 0..100 {
            let records = self.activity.records();
            if records.len() >= expected {
                return records;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.activity.records()
    }
}

/// Build the application state the way `initialize_services` does, minus the
/// database and aws-sdk-s3.
pub fn build_state(config: GatewayConfig, tenants: Vec<TenantBackendConfig>) -> (
    Arc<AppState>,
    Arc<InMemoryTenantConfigStore>,
    Arc<InMemoryActivityLog>,
    Arc<MemoryClientFactory>,
) {
    let tenant_store = Arc::new(InMemoryTenantConfigStore::with_configs(tenants));
    let activity = Arc::new(InMemoryActivityLog::new());
    let clients = Arc::new(MemoryClientFactory::new(MemoryObjectStore::new()));
    let forwarder = ControlPlaneForwarder::new(&ProxySettings::default())
        .expect("Failed to build forwarder");

    let state = Arc::new(AppState {
        authenticator: Arc::new(JwtAuthenticator::new(config.jwt_secret())),
        config,
        tenants: tenant_store.clone(),
        activity: activity.clone(),
        clients: clients.clone(),
        forwarder,
    });

    (state, tenant_store, activity, clients)
}

/// Setup a test application serving the given tenants
pub async fn setup_test_app(tenants: Vec<TenantBackendConfig>) -> TestApp {
    setup_test_app_with_config(GatewayConfig::for_tests(JWT_SECRET), tenants).await
}

/// Setup a test application with an adjusted configuration
pub async fn setup_test_app_with_config(
    config: GatewayConfig,
    tenants: Vec<TenantBackendConfig>,
) -> TestApp {
    let (state, tenants, activity, clients) = build_state(config.clone(), tenants);

    let app = setup_routes(&config, state.clone())
        .await
        .expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        tenants,
        activity,
        clients,
    }
}
