//! Origin HTTP client.
//!
//! ### Fetch behavior
//! - Bounded timeout per request (default: 10s)
//! - Max redirects: 5
//! - Transparent gzip/brotli/deflate decompression; the caller's
//!   `Accept-Encoding` is not forwarded
//! - Hop-by-hop headers stripped in both directions
//!
//! ### Cacheability
//! A response may be written to the store only when it is a plain 200
//! and its final URL (after redirects) stayed on the configured origin.
//! Everything else is served to the caller but never stored.

pub mod url;

use bytes::Bytes;
use reqwest::{Client, Url, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, resolve, same_origin};

use async_trait::async_trait;
use outpost_core::Error;

/// Headers that describe the connection rather than the resource.
///
/// These never cross the proxy: the origin client and the listener each
/// re-frame their own connections. `content-length` and
/// `content-encoding` belong here too because bodies are decompressed
/// and re-framed in between.
pub const CONNECTION_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
];

/// Check whether a header is connection-scoped and must not be forwarded.
pub fn is_connection_header(name: &str) -> bool {
    CONNECTION_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Configuration for the origin client.
#[derive(Debug, Clone)]
pub struct OriginConfig {
    /// Base origin that relative targets resolve against
    pub base: Url,

    /// User agent string (default: "outpost/0.1")
    pub user_agent: String,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl OriginConfig {
    /// Config with defaults for everything except the base origin.
    pub fn new(base: Url) -> Self {
        Self {
            base,
            user_agent: "outpost/0.1".to_string(),
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
        }
    }
}

/// Response from an origin fetch.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response headers, connection-scoped ones removed
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl OriginResponse {
    /// Whether this response may be written to the store for `base`.
    ///
    /// Only a plain 200 whose final URL stayed on the configured origin
    /// qualifies. Redirected-off-origin responses are still served to
    /// the caller but treated as opaque by the cache.
    pub fn is_cacheable_for(&self, base: &Url) -> bool {
        self.status == 200 && same_origin(&self.final_url, base)
    }
}

/// The network seam between the proxy and the origin.
///
/// Production uses [`OriginClient`]; tests script this trait to model
/// outages, redirects, and slow origins without a live server.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    /// Perform one HTTP exchange with the origin.
    ///
    /// `headers` are the caller's request headers; implementations drop
    /// connection-scoped ones. Non-2xx statuses are returned as values,
    /// not errors: [`Error::NetworkFailure`] means the exchange itself
    /// failed (unreachable origin, timeout, broken transfer).
    async fn fetch(
        &self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<OriginResponse, Error>;

    /// Fetch bypassing intermediary HTTP caches.
    ///
    /// Used when pre-warming a generation, so a stale copy held by some
    /// intermediary never seeds the store.
    async fn fetch_fresh(&self, url: &Url) -> Result<OriginResponse, Error> {
        let headers = [("cache-control".to_string(), "no-cache".to_string())];
        self.fetch("GET", url, &headers, None).await
    }
}

/// Origin client backed by reqwest.
pub struct OriginClient {
    http: Client,
    config: OriginConfig,
}

impl OriginClient {
    /// Create a new origin client with the given configuration.
    pub fn new(config: OriginConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkFailure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &OriginConfig {
        &self.config
    }
}

#[async_trait]
impl OriginFetcher for OriginClient {
    async fn fetch(
        &self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<OriginResponse, Error> {
        let start = Instant::now();

        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::NetworkFailure(format!("invalid method: {e}")))?;

        let mut request = self.http.request(method, url.as_str());
        for (name, value) in headers {
            // Encoding negotiation stays between this client and the
            // origin: reqwest advertises exactly the codings it decodes,
            // which is what makes stripping content-encoding below sound.
            if is_connection_header(name)
                || name.eq_ignore_ascii_case("host")
                || name.eq_ignore_ascii_case("accept-encoding")
            {
                continue;
            }
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(format!("origin unreachable: {e}")))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_connection_header(name.as_str()))
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("failed to read origin response: {e}")))?;

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "origin {} -> {} in {}ms ({} bytes)",
            url,
            status,
            fetch_ms,
            body.len()
        );

        Ok(OriginResponse {
            url: url.clone(),
            final_url,
            status,
            content_type,
            headers: response_headers,
            body,
            fetch_ms,
        })
    }
}
