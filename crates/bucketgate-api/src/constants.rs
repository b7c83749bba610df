//! Constants of the HTTP layer.

use std::time::Duration;

pub use bucketgate_core::constants::API_PREFIX;

/// Path the OpenAPI document is served from.
pub const OPENAPI_PATH: &str = "/openapi.json";

/// Upper bound for each dependency probe of `/health`.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long open connections may drain after a shutdown signal.
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP/2 keep-alive ping interval.
pub const HTTP2_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Pause after a failed `accept`, e.g. on file descriptor exhaustion.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);
