//! Path rewriting for forwarded control-plane requests.

use bucketgate_core::AppError;
use reqwest::Url;

/// Join two path fragments with exactly one `/` at the junction, however
/// many slashes either side carries there.
pub fn single_join(base: &str, suffix: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        suffix.trim_start_matches('/')
    )
}

/// Remove the gateway mount (`/api/{tenant_id}`) from an inbound path.
///
/// The result always starts with `/`; a bare mount becomes `/`. A path that
/// does not start with the mount is returned unchanged.
pub fn strip_mount_prefix<'a>(path: &'a str, mount_prefix: &str) -> &'a str {
    match path.strip_prefix(mount_prefix) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Upstream URL for a forwarded request: admin base path joined with the
/// stripped inbound path, inbound query kept as is.
pub fn upstream_url(
    endpoint: &str,
    mount_prefix: &str,
    path: &str,
    query: Option<&str>,
) -> Result<Url, AppError> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        AppError::InconsistentTenantConfig(format!("invalid admin URL '{}': {}", endpoint, e))
    })?;

    let joined = single_join(url.path(), strip_mount_prefix(path, mount_prefix));
    url.set_path(&joined);
    url.set_query(query);

    Ok(url)
}
