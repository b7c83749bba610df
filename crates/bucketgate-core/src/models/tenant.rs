use crate::constants::{EXTERNAL_DEFAULT_REGION, MANAGED_DEFAULT_REGION};
use crate::error::AppError;
use crate::models::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub type TenantId = i64;

/// Backend flavour of a tenant.
///
/// `Managed` deployments expose an administrative control plane next to the
/// object-storage API; `External` ones are plain S3-compatible endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Managed,
    External,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Managed => "managed",
            BackendKind::External => "external",
        }
    }

    pub fn default_region(&self) -> &'static str {
        match self {
            BackendKind::Managed => MANAGED_DEFAULT_REGION,
            BackendKind::External => EXTERNAL_DEFAULT_REGION,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    /// Accepts the canonical names plus the legacy `garage` / `s3` type labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "managed" | "garage" => Ok(BackendKind::Managed),
            "external" | "s3" => Ok(BackendKind::External),
            other => Err(AppError::InconsistentTenantConfig(format!(
                "unknown backend kind '{}'",
                other
            ))),
        }
    }
}

/// Backend configuration of one tenant, loaded per request and never cached.
#[derive(Clone)]
pub struct TenantBackendConfig {
    pub id: TenantId,
    pub owner_id: i64,
    pub name: String,
    pub kind: BackendKind,
    pub data_plane_endpoint: String,
    pub control_plane_endpoint: Option<String>,
    pub control_plane_token: Option<String>,
    pub access_key_id: String,
    pub access_secret: String,
    pub region: String,
    pub path_style: bool,
}

// Secrets never reach logs.
impl fmt::Debug for TenantBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantBackendConfig")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("data_plane_endpoint", &self.data_plane_endpoint)
            .field("control_plane_endpoint", &self.control_plane_endpoint)
            .field(
                "control_plane_token",
                &self.control_plane_token.as_ref().map(|_| "<redacted>"),
            )
            .field("access_key_id", &self.access_key_id)
            .field("access_secret", &"<redacted>")
            .field("region", &self.region)
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Administrative endpoint and service token of a managed tenant.
#[derive(Clone)]
pub struct ControlPlaneTarget {
    pub endpoint: String,
    pub token: Option<String>,
}

impl fmt::Debug for ControlPlaneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlaneTarget")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Prefix `http://` onto endpoints stored without a scheme.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

impl TenantBackendConfig {
    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner_id == identity.user_id
    }

    /// Stored region, or the kind's default when none was stored.
    pub fn effective_region(&self) -> &str {
        let region = self.region.trim();
        if region.is_empty() {
            self.kind.default_region()
        } else {
            region
        }
    }

    /// An external backend must never carry a control-plane endpoint.
    pub fn check_consistency(&self) -> Result<(), AppError> {
        if self.kind == BackendKind::External
            && non_empty(self.control_plane_endpoint.as_deref()).is_some()
        {
            return Err(AppError::InconsistentTenantConfig(format!(
                "tenant {} is external but has a control-plane endpoint",
                self.id
            )));
        }
        Ok(())
    }

    /// Resolve the administrative target for control-plane forwarding.
    pub fn control_plane(&self) -> Result<ControlPlaneTarget, AppError> {
        self.check_consistency()?;

        if self.kind == BackendKind::External {
            return Err(AppError::ControlPlaneNotConfigured(
                "External backends have no admin API".to_string(),
            ));
        }

        let endpoint = non_empty(self.control_plane_endpoint.as_deref()).ok_or_else(|| {
            AppError::ControlPlaneNotConfigured("Admin URL not configured".to_string())
        })?;

        Ok(ControlPlaneTarget {
            endpoint: normalize_endpoint(endpoint),
            token: non_empty(self.control_plane_token.as_deref()).map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn managed() -> TenantBackendConfig {
        TenantBackendConfig {
            id: 7,
            owner_id: 1,
            name: "garage".to_string(),
            kind: BackendKind::Managed,
            data_plane_endpoint: "http://s3.internal:3900".to_string(),
            control_plane_endpoint: Some("http://admin.internal".to_string()),
            control_plane_token: Some("admin-token".to_string()),
            access_key_id: "GK123".to_string(),
            access_secret: "secret".to_string(),
            region: String::new(),
            path_style: true,
        }
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("managed".parse::<BackendKind>().unwrap(), BackendKind::Managed);
        assert_eq!("garage".parse::<BackendKind>().unwrap(), BackendKind::Managed);
        assert_eq!("External".parse::<BackendKind>().unwrap(), BackendKind::External);
        assert_eq!("s3".parse::<BackendKind>().unwrap(), BackendKind::External);
        assert!(matches!(
            "ftp".parse::<BackendKind>(),
            Err(AppError::InconsistentTenantConfig(_))
        ));
    }

    #[test]
    fn test_effective_region_defaults_per_kind() {
        let mut config = managed();
        assert_eq!(config.effective_region(), "garage");
        config.kind = BackendKind::External;
        config.control_plane_endpoint = None;
        assert_eq!(config.effective_region(), "us-east-1");
        config.region = "eu-west-3".to_string();
        assert_eq!(config.effective_region(), "eu-west-3");
    }

    #[test]
    fn test_control_plane_for_managed_tenant() {
        let target = managed().control_plane().unwrap();
        assert_eq!(target.endpoint, "http://admin.internal");
        assert_eq!(target.token.as_deref(), Some("admin-token"));
    }

    #[test]
    fn test_control_plane_missing_endpoint_is_caller_error() {
        let mut config = managed();
        config.control_plane_endpoint = Some("  ".to_string());
        assert!(matches!(
            config.control_plane(),
            Err(AppError::ControlPlaneNotConfigured(_))
        ));
    }

    #[test]
    fn test_external_with_admin_endpoint_is_inconsistent() {
        let mut config = managed();
        config.kind = BackendKind::External;
        assert!(matches!(
            config.control_plane(),
            Err(AppError::InconsistentTenantConfig(_))
        ));
    }

    #[test]
    fn test_external_without_admin_endpoint_has_no_control_plane() {
        let mut config = managed();
        config.kind = BackendKind::External;
        config.control_plane_endpoint = None;
        assert!(config.check_consistency().is_ok());
        assert!(matches!(
            config.control_plane(),
            Err(AppError::ControlPlaneNotConfigured(_))
        ));
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("admin:3903"), "http://admin:3903");
        assert_eq!(normalize_endpoint("https://admin"), "https://admin");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", managed());
        assert!(!rendered.contains("admin-token"));
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_ownership() {
        let config = managed();
        assert!(config.is_owned_by(&Identity::new(1, "alice", "user")));
        assert!(!config.is_owned_by(&Identity::new(2, "bob", "user")));
    }
}
