//! Test doubles shared across the server test modules.

use async_trait::async_trait;
use bytes::Bytes;
use outpost_client::{OriginFetcher, OriginResponse};
use outpost_core::{Error, StoreRecord, VersionedStore};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

/// One scripted answer, keyed by the exact request URL.
#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
    final_url: Option<String>,
}

/// One observed exchange.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Scripted stand-in for the origin. Answers from a URL-keyed table,
/// replies 404 to anything unscripted, and fails every exchange while
/// offline. Records each call so tests can assert on traffic.
#[derive(Default)]
pub struct ScriptedOrigin {
    replies: Mutex<HashMap<String, Reply>>,
    offline: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an arbitrary status for `url`.
    pub fn respond(&self, url: &str, status: u16, content_type: &str, body: &[u8]) {
        self.replies.lock().unwrap().insert(
            url.to_string(),
            Reply {
                status,
                content_type: Some(content_type.to_string()),
                body: body.to_vec(),
                final_url: None,
            },
        );
    }

    /// Script a plain 200 for `url`.
    pub fn ok(&self, url: &str, content_type: &str, body: &[u8]) {
        self.respond(url, 200, content_type, body);
    }

    /// Script a 200 whose redirect chain lands on `final_url`.
    pub fn redirected(&self, url: &str, final_url: &str, content_type: &str, body: &[u8]) {
        self.replies.lock().unwrap().insert(
            url.to_string(),
            Reply {
                status: 200,
                content_type: Some(content_type.to_string()),
                body: body.to_vec(),
                final_url: Some(final_url.to_string()),
            },
        );
    }

    /// Drop the script for `url`; subsequent fetches answer 404.
    pub fn clear(&self, url: &str) {
        self.replies.lock().unwrap().remove(url);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| call.url == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Request bodies observed for `url`, in call order.
    pub fn bodies_for(&self, url: &str) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.url == url)
            .filter_map(|call| call.body.clone())
            .collect()
    }

    /// Request headers observed for `url`, one entry per call.
    pub fn headers_for(&self, url: &str) -> Vec<Vec<(String, String)>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.url == url)
            .map(|call| call.headers.clone())
            .collect()
    }
}

#[async_trait]
impl OriginFetcher for ScriptedOrigin {
    async fn fetch(
        &self,
        _method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<OriginResponse, Error> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.as_ref().map(|b| b.to_vec()),
        });

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure("origin offline (scripted)".to_string()));
        }

        let reply = self.replies.lock().unwrap().get(url.as_str()).cloned().unwrap_or(Reply {
            status: 404,
            content_type: Some("text/plain".to_string()),
            body: b"not found".to_vec(),
            final_url: None,
        });

        let final_url = match &reply.final_url {
            Some(final_url) => Url::parse(final_url).unwrap(),
            None => url.clone(),
        };

        let mut response_headers = Vec::new();
        if let Some(content_type) = &reply.content_type {
            response_headers.push(("content-type".to_string(), content_type.clone()));
        }

        Ok(OriginResponse {
            url: url.clone(),
            final_url,
            status: reply.status,
            content_type: reply.content_type,
            headers: response_headers,
            body: Bytes::from(reply.body),
            fetch_ms: 1,
        })
    }
}

/// Poll until a spawned write-back lands, or give up after half a second.
pub async fn wait_for_record(
    store: &VersionedStore,
    generation: &str,
    key: &str,
) -> Option<StoreRecord> {
    for _ in 0..100 {
        if let Ok(Some(record)) = store.get_record(generation, key).await {
            return Some(record);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}
