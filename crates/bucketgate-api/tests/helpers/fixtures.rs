use bucketgate_core::{BackendKind, TenantBackendConfig};

pub const OWNER: i64 = 1;
pub const STRANGER: i64 = 2;

/// Managed tenant with stored credentials and an optional admin endpoint
pub fn managed_tenant(id: i64, owner_id: i64, admin_endpoint: Option<&str>) -> TenantBackendConfig {
    TenantBackendConfig {
        id,
        owner_id,
        name: format!("project-{}", id),
        kind: BackendKind::Managed,
        data_plane_endpoint: "http://garage.internal:3900".to_string(),
        control_plane_endpoint: admin_endpoint.map(str::to_string),
        control_plane_token: admin_endpoint.map(|_| "admin-token".to_string()),
        access_key_id: "GKSTORED".to_string(),
        access_secret: "stored-secret".to_string(),
        region: String::new(),
        path_style: true,
    }
}

/// Plain S3-compatible tenant
pub fn external_tenant(id: i64, owner_id: i64) -> TenantBackendConfig {
    TenantBackendConfig {
        id,
        owner_id,
        name: format!("external-{}", id),
        kind: BackendKind::External,
        data_plane_endpoint: "https://s3.example.com".to_string(),
        control_plane_endpoint: None,
        control_plane_token: None,
        access_key_id: "AKIASTORED".to_string(),
        access_secret: "stored-secret".to_string(),
        region: "eu-west-1".to_string(),
        path_style: false,
    }
}
