//! Configuration module
//!
//! Gateway configuration is read once at start-up from the environment (and an
//! optional `.env` file) and then passed by value to the components that need it.

use ipnetwork::IpNetwork;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const UPLOAD_TIMEOUT_SECS: u64 = 3600;
const HEADER_READ_TIMEOUT_SECS: u64 = 10;
const MAX_UPLOAD_SIZE_MB: usize = 5120;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const PROXY_CONNECT_TIMEOUT_SECS: u64 = 10;
const PROXY_TIMEOUT_SECS: u64 = 60;
const PROXY_POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const PROXY_POOL_MAX_IDLE_PER_HOST: usize = 100;
const S3_CONNECT_TIMEOUT_SECS: u64 = 10;
const TRUSTED_PROXY_COUNT: usize = 1;
/// Loopback and private ranges, where load balancers usually live.
const TRUSTED_PROXY_NETWORKS: &str =
    "127.0.0.1/32,::1/128,10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,fd00::/8";
const AUTH_MAX_FAILURES: u32 = 10;
const AUTH_FAILURE_WINDOW_SECS: u64 = 900;

/// Outbound settings for the control-plane reverse proxy
#[derive(Clone, Debug)]
pub struct ProxySettings {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub accept_invalid_certs: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(PROXY_CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(PROXY_TIMEOUT_SECS),
            pool_idle_timeout: Duration::from_secs(PROXY_POOL_IDLE_TIMEOUT_SECS),
            pool_max_idle_per_host: PROXY_POOL_MAX_IDLE_PER_HOST,
            accept_invalid_certs: true,
        }
    }
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub run_migrations: bool,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub header_read_timeout_secs: u64,
    pub max_upload_size_bytes: usize,
    pub http_concurrency_limit: usize,
    pub proxy: ProxySettings,
    pub s3_connect_timeout_secs: u64,
    pub trusted_proxy_count: usize,
    /// Socket peers whose forwarding headers are believed.
    pub trusted_proxy_networks: Vec<IpNetwork>,
    pub auth_max_failures: u32,
    pub auth_failure_window_secs: u64,
    pub log_format: String,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a comma list of IP addresses or CIDR ranges.
fn parse_networks(list: &str) -> Result<Vec<IpNetwork>, anyhow::Error> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            IpNetwork::from_str(item)
                .map_err(|e| anyhow::anyhow!("Invalid trusted proxy network '{}': {}", item, e))
        })
        .collect()
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let max_upload_size_mb: usize = env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB);

        let proxy = ProxySettings {
            connect_timeout: Duration::from_secs(env_or(
                "PROXY_CONNECT_TIMEOUT_SECS",
                PROXY_CONNECT_TIMEOUT_SECS,
            )),
            timeout: Duration::from_secs(env_or("PROXY_TIMEOUT_SECS", PROXY_TIMEOUT_SECS)),
            pool_idle_timeout: Duration::from_secs(env_or(
                "PROXY_POOL_IDLE_TIMEOUT_SECS",
                PROXY_POOL_IDLE_TIMEOUT_SECS,
            )),
            pool_max_idle_per_host: env_or(
                "PROXY_POOL_MAX_IDLE_PER_HOST",
                PROXY_POOL_MAX_IDLE_PER_HOST,
            ),
            accept_invalid_certs: env_flag("PROXY_ACCEPT_INVALID_CERTS", true),
        };

        let trusted_proxy_networks = env::var("TRUSTED_PROXY_NETWORKS")
            .unwrap_or_else(|_| TRUSTED_PROXY_NETWORKS.to_string());
        let trusted_proxy_networks = parse_networks(&trusted_proxy_networks)?;

        Ok(GatewayConfig {
            server_port,
            environment,
            cors_origins,
            jwt_secret,
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            run_migrations: env_flag("RUN_MIGRATIONS", true),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS),
            upload_timeout_secs: env_or("UPLOAD_TIMEOUT_SECS", UPLOAD_TIMEOUT_SECS),
            header_read_timeout_secs: env_or("HEADER_READ_TIMEOUT_SECS", HEADER_READ_TIMEOUT_SECS),
            max_upload_size_bytes: max_upload_size_mb.saturating_mul(1024 * 1024),
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT)
                .max(1),
            proxy,
            s3_connect_timeout_secs: env_or("S3_CONNECT_TIMEOUT_SECS", S3_CONNECT_TIMEOUT_SECS),
            trusted_proxy_count: env_or("TRUSTED_PROXY_COUNT", TRUSTED_PROXY_COUNT),
            trusted_proxy_networks,
            auth_max_failures: env_or("AUTH_MAX_FAILURES", AUTH_MAX_FAILURES),
            auth_failure_window_secs: env_or("AUTH_FAILURE_WINDOW_SECS", AUTH_FAILURE_WINDOW_SECS),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        })
    }

    /// Configuration suitable for tests and local tooling; no environment access.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        GatewayConfig {
            server_port: 0,
            environment: "test".to_string(),
            cors_origins: vec!["*".to_string()],
            jwt_secret: jwt_secret.into(),
            database_url: "postgresql://localhost/bucketgate_test".to_string(),
            db_max_connections: 1,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            run_migrations: false,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            header_read_timeout_secs: HEADER_READ_TIMEOUT_SECS,
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
            proxy: ProxySettings::default(),
            s3_connect_timeout_secs: S3_CONNECT_TIMEOUT_SECS,
            trusted_proxy_count: 0,
            trusted_proxy_networks: parse_networks(TRUSTED_PROXY_NETWORKS).unwrap_or_default(),
            auth_max_failures: AUTH_MAX_FAILURES,
            auth_failure_window_secs: AUTH_FAILURE_WINDOW_SECS,
            log_format: "text".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.database_url.starts_with("postgresql://")
            || self.database_url.starts_with("postgres://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.request_timeout_secs == 0
            || self.upload_timeout_secs == 0
            || self.header_read_timeout_secs == 0
        {
            return Err(anyhow::anyhow!(
                "REQUEST_TIMEOUT_SECS, UPLOAD_TIMEOUT_SECS and HEADER_READ_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.proxy.timeout.is_zero() || self.proxy.connect_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "PROXY_TIMEOUT_SECS and PROXY_CONNECT_TIMEOUT_SECS must be greater than zero"
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.db_timeout_seconds
    }

    pub fn run_migrations(&self) -> bool {
        self.run_migrations
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout_secs)
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_bytes
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.http_concurrency_limit
    }

    pub fn proxy(&self) -> &ProxySettings {
        &self.proxy
    }

    pub fn s3_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.s3_connect_timeout_secs)
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.trusted_proxy_count
    }

    pub fn trusted_proxy_networks(&self) -> &[IpNetwork] {
        &self.trusted_proxy_networks
    }

    pub fn auth_max_failures(&self) -> u32 {
        self.auth_max_failures
    }

    pub fn auth_failure_window_secs(&self) -> u64 {
        self.auth_failure_window_secs
    }

    pub fn log_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        GatewayConfig::for_tests("0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = valid();
        config.jwt_secret = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_validate_rejects_non_postgres_url() {
        let mut config = valid();
        config.database_url = "mysql://localhost/db".to_string();
        assert!(config.validate().is_err());

        config.database_url = "postgres://localhost/db".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = valid();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.proxy.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut config = valid();
        assert!(!config.is_production());
        config.environment = "Production".to_string();
        assert!(config.is_production());
        config.environment = "prod".to_string();
        assert!(config.is_production());
    }

    #[test]
    fn test_proxy_defaults() {
        let proxy = ProxySettings::default();
        assert_eq!(proxy.pool_idle_timeout, Duration::from_secs(90));
        assert_eq!(proxy.connect_timeout, Duration::from_secs(10));
        assert!(proxy.accept_invalid_certs);
    }

    #[test]
    fn test_default_trusted_networks_cover_loopback_and_private_ranges() {
        let config = valid();
        let trusted = |ip: &str| {
            let ip = ip.parse().unwrap();
            config
                .trusted_proxy_networks()
                .iter()
                .any(|network| network.contains(ip))
        };
        assert!(trusted("127.0.0.1"));
        assert!(trusted("::1"));
        assert!(trusted("10.1.2.3"));
        assert!(trusted("192.168.0.10"));
        assert!(!trusted("203.0.113.7"));
    }

    #[test]
    fn test_parse_networks() {
        let networks = parse_networks(" 10.0.0.1, 172.16.0.0/12 ,,").unwrap();
        assert_eq!(networks.len(), 2);
        assert!(networks[0].contains("10.0.0.1".parse().unwrap()));
        assert!(parse_networks("").unwrap().is_empty());
        assert!(parse_networks("10.0.0.0/40").is_err());
        assert!(parse_networks("proxy.internal").is_err());
    }
}
