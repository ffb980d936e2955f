//! URL resolution against the configured origin.
//!
//! Manifest entries and intercepted request targets are usually
//! origin-relative paths (`/static/css/style.css`); absolute URLs show
//! up for third-party traffic. Both forms resolve to a canonical
//! absolute URL so that store keys stay stable.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target against a base origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Join origin-relative targets onto `base`; parse absolute targets as-is
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(base: &Url, target: &str) -> Result<Url, UrlError> {
    let trimmed = target.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = if trimmed.contains("://") {
        Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = resolved.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            resolved
                .set_host(Some(&lowered))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
    }

    resolved.set_fragment(None);

    Ok(resolved)
}

/// True when two URLs share a trust boundary: same scheme, host, and port.
///
/// Responses that redirected off this boundary are never written to the
/// store, so a compromised or misconfigured redirect cannot poison it.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
