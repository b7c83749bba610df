//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use crate::dispatcher::validate_dispatch_table;
use anyhow::{Context, Result};
use bucketgate_core::GatewayConfig;

/// Validate configuration and the dispatch table before anything is wired
pub fn validate_config(config: &GatewayConfig) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();
    let env_var = std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .ok();

    if is_production && env_var.is_none() {
        tracing::warn!(
            "Production mode detected but ENVIRONMENT/APP_ENV not set - error details may leak"
        );
    }

    if is_production && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Set specific allowed origins via CORS_ORIGINS."
        ));
    }

    if is_production && config.proxy().accept_invalid_certs {
        tracing::warn!(
            "PROXY_ACCEPT_INVALID_CERTS is enabled in production - admin endpoint certificates are not verified"
        );
    }

    if config.trusted_proxy_count() > 10 {
        tracing::warn!(
            trusted_proxy_count = config.trusted_proxy_count(),
            "TRUSTED_PROXY_COUNT is very high - ensure this matches your actual proxy setup"
        );
    }

    if config.db_max_connections() == 0 {
        return Err(anyhow::anyhow!("Database max connections cannot be 0"));
    }

    if config.db_timeout_seconds() == 0 {
        return Err(anyhow::anyhow!("Database timeout cannot be 0"));
    }

    if config.http_concurrency_limit() == 0 {
        return Err(anyhow::anyhow!("HTTP concurrency limit cannot be 0"));
    }

    if config.auth_max_failures() == 0 || config.auth_failure_window_secs() == 0 {
        return Err(anyhow::anyhow!(
            "AUTH_MAX_FAILURES and AUTH_FAILURE_WINDOW_SECS must be greater than zero"
        ));
    }

    validate_dispatch_table().context("Invalid dispatch table")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_default_test_config_is_valid() {
        let config = GatewayConfig::for_tests(SECRET);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let config = GatewayConfig::for_tests("short");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = GatewayConfig::for_tests(SECRET);
        config.http_concurrency_limit = 0;
        assert!(validate_config(&config).is_err());
    }
}
