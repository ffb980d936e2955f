//! Request coordination: cache-first serving with live fallthrough.
//!
//! Every intercepted request flows through [`FetchCoordinator::handle`].
//! Bypassed traffic goes straight to the origin and never touches the
//! store. Cache-first traffic is answered from the current generation
//! when a record exists; misses are fetched live and written back from
//! a spawned task so the caller never waits on the store.
//!
//! `handle` never returns an error. Failures become responses: an
//! unreachable origin on the bypass path is a 502, an unreachable
//! origin with no cached fallback is a 503.

use bytes::Bytes;
use outpost_client::origin::{OriginResponse, resolve};
use outpost_client::{ClassifierRules, Decision, OriginFetcher};
use outpost_core::key::request_key;
use outpost_core::{Error, StoreRecord, VersionedStore};
use std::sync::Arc;
use url::Url;

/// One intercepted request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: String,

    /// Absolute URL or origin-relative path-and-query.
    pub url: String,

    pub headers: Vec<(String, String)>,

    /// Present only so bypassed writes (form POSTs and the like) pass
    /// through intact. The classifier and the store key ignore it.
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    /// Bare GET with no headers, the common case at call sites and in tests.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), url: url.into(), headers: Vec::new(), body: None }
    }
}

/// Which side answered the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
}

impl ServedFrom {
    pub fn as_str(self) -> &'static str {
        match self {
            ServedFrom::Cache => "cache",
            ServedFrom::Network => "network",
        }
    }
}

/// The coordinator's answer for one request.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub served_from: ServedFrom,
}

impl ResponseDescriptor {
    fn from_record(record: StoreRecord) -> Self {
        let mut headers = Vec::new();
        if let Some(content_type) = record.content_type {
            headers.push(("content-type".to_string(), content_type));
        }
        Self {
            status: record.status,
            headers,
            body: Bytes::from(record.body),
            served_from: ServedFrom::Cache,
        }
    }

    fn from_origin(response: OriginResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            served_from: ServedFrom::Network,
        }
    }

    fn plain_text(status: u16, body: &'static str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::from_static(body.as_bytes()),
            served_from: ServedFrom::Network,
        }
    }
}

/// Serves intercepted requests from the store or the origin.
pub struct FetchCoordinator {
    store: VersionedStore,
    origin: Arc<dyn OriginFetcher>,
    rules: ClassifierRules,
    base: Url,
    fallback_path: String,
}

impl FetchCoordinator {
    pub fn new(
        store: VersionedStore,
        origin: Arc<dyn OriginFetcher>,
        rules: ClassifierRules,
        base: Url,
        fallback_path: String,
    ) -> Self {
        Self { store, origin, rules, base, fallback_path }
    }

    /// Serve one request. Never panics, never returns `Err`.
    pub async fn handle(&self, request: RequestDescriptor) -> ResponseDescriptor {
        match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => error_response(&request.url, err),
        }
    }

    async fn dispatch(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor, Error> {
        let url = resolve(&self.base, &request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        match self.rules.classify(&request.method, url.as_str()) {
            Decision::Bypass => self.serve_bypass(request, &url).await,
            Decision::CacheFirst => self.serve_cache_first(request, &url).await,
        }
    }

    /// Live traffic: forward to the origin, return the result unmodified.
    /// The store is neither read nor written on this path.
    async fn serve_bypass(
        &self,
        request: &RequestDescriptor,
        url: &Url,
    ) -> Result<ResponseDescriptor, Error> {
        let response = self
            .origin
            .fetch(&request.method, url, &request.headers, request.body.clone())
            .await?;

        tracing::debug!("bypass {} {} -> {}", request.method, url, response.status);

        Ok(ResponseDescriptor::from_origin(response))
    }

    async fn serve_cache_first(
        &self,
        request: &RequestDescriptor,
        url: &Url,
    ) -> Result<ResponseDescriptor, Error> {
        let generation = match self.store.current_generation().await {
            Ok(generation) => generation,
            Err(err) => {
                tracing::warn!("current generation lookup failed: {}", err);
                None
            }
        };

        if let Some(generation) = &generation {
            let key = request_key(&request.method, url.as_str());
            match self.store.get_record(generation, &key).await {
                Ok(Some(record)) => {
                    tracing::debug!("cache hit for {}", url);
                    return Ok(ResponseDescriptor::from_record(record));
                }
                Ok(None) => tracing::debug!("cache miss for {}", url),
                Err(err) => tracing::warn!("store read failed for {}: {}", url, err),
            }
        }

        match self.origin.fetch(&request.method, url, &request.headers, None).await {
            Ok(response) => {
                if let Some(generation) = generation {
                    if response.is_cacheable_for(&self.base) {
                        self.spawn_write_back(generation, &request.method, url.clone(), &response);
                    }
                }
                Ok(ResponseDescriptor::from_origin(response))
            }
            Err(err) => {
                tracing::warn!("origin fetch failed for {}: {}", url, err);
                self.serve_offline(request, generation.as_deref()).await
            }
        }
    }

    /// Copy a fresh response into the current generation without holding up
    /// the caller. Write failures are logged and swallowed.
    fn spawn_write_back(
        &self,
        generation: String,
        method: &str,
        url: Url,
        response: &OriginResponse,
    ) {
        let record = StoreRecord::new(
            generation.as_str(),
            method,
            url.as_str(),
            response.status,
            response.content_type.clone(),
            response.body.to_vec(),
        );
        let store = self.store.clone();

        tokio::spawn(async move {
            match store.put_record(&record).await {
                Ok(()) => tracing::debug!("cached {} under generation {}", url, generation),
                Err(Error::StorageFull(reason)) => {
                    tracing::warn!("store full, served {} uncached: {}", url, reason);
                }
                Err(err) => tracing::error!("cache write failed for {}: {}", url, err),
            }
        });
    }

    /// Network and cache both failed. Navigations get the pre-warmed root
    /// document when one exists; everything else is a plain 503.
    async fn serve_offline(
        &self,
        request: &RequestDescriptor,
        generation: Option<&str>,
    ) -> Result<ResponseDescriptor, Error> {
        if is_navigation(&request.headers)
            && let Some(generation) = generation
            && let Ok(fallback) = resolve(&self.base, &self.fallback_path)
        {
            let key = request_key("GET", fallback.as_str());
            if let Ok(Some(record)) = self.store.get_record(generation, &key).await {
                tracing::info!("serving offline fallback document for {}", request.url);
                return Ok(ResponseDescriptor::from_record(record));
            }
        }

        Err(Error::Unavailable(request.url.clone()))
    }
}

/// Fold a serving-path failure into a response. The taxonomy maps onto
/// HTTP statuses here, at the single exit point.
fn error_response(url: &str, err: Error) -> ResponseDescriptor {
    match err {
        Error::InvalidUrl(reason) => {
            tracing::warn!("rejected request for {:?}: {}", url, reason);
            ResponseDescriptor::plain_text(400, "Bad request - invalid target")
        }
        Error::NetworkFailure(reason) => {
            tracing::warn!("bypass target unreachable for {}: {}", url, reason);
            ResponseDescriptor::plain_text(502, "Bad gateway - origin unreachable")
        }
        Error::Unavailable(_) => ResponseDescriptor::plain_text(503, "Offline - resource unavailable"),
        err => {
            tracing::error!("unexpected serving failure for {}: {}", url, err);
            ResponseDescriptor::plain_text(500, "Internal proxy error")
        }
    }
}

/// A top-level page view. `Sec-Fetch-Dest` is authoritative when present;
/// otherwise an HTML `Accept` header counts.
fn is_navigation(headers: &[(String, String)]) -> bool {
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("sec-fetch-dest") {
            return value.eq_ignore_ascii_case("document");
        }
    }

    headers
        .iter()
        .any(|(name, value)| name.eq_ignore_ascii_case("accept") && value.contains("text/html"))
}
