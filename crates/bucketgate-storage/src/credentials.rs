//! Credential resolution
//!
//! Turns a tenant's stored backend configuration plus an optional caller-supplied
//! key pair into the concrete parameters a client is built from. The override is
//! honoured for managed backends only; an external backend's stored credentials
//! are the sole source of truth.

use crate::traits::{StorageError, StorageResult};
use bucketgate_core::models::storage::CredentialFields;
use bucketgate_core::models::{normalize_endpoint, BackendKind};
use bucketgate_core::TenantBackendConfig;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    /// `None` leaves endpoint selection to the SDK (plain AWS S3).
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub access_secret: String,
    pub region: String,
    pub path_style: bool,
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("access_secret", &"<redacted>")
            .field("region", &self.region)
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Caller-supplied key pair.
#[derive(Clone)]
pub struct CredentialOverride {
    pub key_id: String,
    pub secret: String,
}

impl fmt::Debug for CredentialOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialOverride")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl CredentialOverride {
    /// Both fields or neither; blank values count as absent.
    pub fn from_fields(fields: &CredentialFields) -> StorageResult<Option<Self>> {
        match (
            present(fields.key_id.as_deref()),
            present(fields.token.as_deref()),
        ) {
            (None, None) => Ok(None),
            (Some(key_id), Some(secret)) => Ok(Some(Self {
                key_id: key_id.to_string(),
                secret: secret.to_string(),
            })),
            _ => Err(StorageError::InvalidRequest(
                "keyId and token must be supplied together".to_string(),
            )),
        }
    }
}

/// Resolve the connection parameters for one request.
pub fn resolve_credentials(
    config: &TenantBackendConfig,
    credential_override: Option<&CredentialOverride>,
) -> StorageResult<ResolvedCredentials> {
    let (access_key_id, access_secret) = match (config.kind, credential_override) {
        (BackendKind::External, Some(_)) => {
            return Err(StorageError::OverrideRejected(
                "Credential override is not allowed for external backends".to_string(),
            ))
        }
        (BackendKind::Managed, Some(o)) => (o.key_id.clone(), o.secret.clone()),
        (_, None) => (config.access_key_id.clone(), config.access_secret.clone()),
    };

    if access_key_id.trim().is_empty() || access_secret.trim().is_empty() {
        return Err(StorageError::ConfigError(format!(
            "project {} has no storage credentials",
            config.id
        )));
    }

    let endpoint = present(Some(config.data_plane_endpoint.as_str())).map(normalize_endpoint);

    Ok(ResolvedCredentials {
        endpoint,
        access_key_id,
        access_secret,
        region: config.effective_region().to_string(),
        path_style: config.path_style,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: BackendKind) -> TenantBackendConfig {
        TenantBackendConfig {
            id: 7,
            owner_id: 1,
            name: "primary".to_string(),
            kind,
            data_plane_endpoint: "s3.internal:3900".to_string(),
            control_plane_endpoint: None,
            control_plane_token: None,
            access_key_id: "STORED".to_string(),
            access_secret: "stored-secret".to_string(),
            region: String::new(),
            path_style: true,
        }
    }

    fn override_pair() -> CredentialOverride {
        CredentialOverride {
            key_id: "CALLER".to_string(),
            secret: "caller-secret".to_string(),
        }
    }

    #[test]
    fn test_managed_backend_uses_override() {
        let resolved =
            resolve_credentials(&config(BackendKind::Managed), Some(&override_pair())).unwrap();
        assert_eq!(resolved.access_key_id, "CALLER");
        assert_eq!(resolved.access_secret, "caller-secret");
        assert_eq!(resolved.region, "garage");
    }

    #[test]
    fn test_external_backend_rejects_override() {
        let err = resolve_credentials(&config(BackendKind::External), Some(&override_pair()))
            .unwrap_err();
        assert!(matches!(err, StorageError::OverrideRejected(_)));
    }

    #[test]
    fn test_stored_credentials_without_override() {
        let resolved = resolve_credentials(&config(BackendKind::External), None).unwrap();
        assert_eq!(resolved.access_key_id, "STORED");
        assert_eq!(resolved.region, "us-east-1");
        assert_eq!(resolved.endpoint.as_deref(), Some("http://s3.internal:3900"));
    }

    #[test]
    fn test_blank_endpoint_defers_to_sdk() {
        let mut cfg = config(BackendKind::External);
        cfg.data_plane_endpoint = "  ".to_string();
        let resolved = resolve_credentials(&cfg, None).unwrap();
        assert!(resolved.endpoint.is_none());
    }

    #[test]
    fn test_half_override_is_invalid() {
        let fields = CredentialFields {
            key_id: Some("CALLER".to_string()),
            token: None,
        };
        assert!(matches!(
            CredentialOverride::from_fields(&fields),
            Err(StorageError::InvalidRequest(_))
        ));

        let blank = CredentialFields {
            key_id: Some(" ".to_string()),
            token: Some(String::new()),
        };
        assert!(CredentialOverride::from_fields(&blank).unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let resolved = resolve_credentials(&config(BackendKind::Managed), None).unwrap();
        assert!(!format!("{:?}", resolved).contains("stored-secret"));
    }
}
