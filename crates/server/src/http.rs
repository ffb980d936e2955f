//! HTTP boundary of the intercept layer.
//!
//! Translates inbound connections into coordinator calls. A reserved
//! `/-/` prefix carries the control surface (trigger dispatch, health);
//! every other request is proxied through [`FetchCoordinator::handle`].
//! hyper http1 with one spawned task per connection.

use crate::gateway::NotificationGateway;
use crate::lifecycle::LifecycleManager;
use crate::proxy::{FetchCoordinator, RequestDescriptor, ResponseDescriptor};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use outpost_core::{AppConfig, VersionedStore};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Control prefix consumed by the adapter before any classification.
const TRIGGER_PREFIX: &str = "/-/trigger/";
const HEALTH_PATH: &str = "/-/health";

/// Response header naming which side answered: `cache` or `network`.
const SERVED_FROM_HEADER: &str = "x-outpost-served-from";

/// Everything a connection task needs, shared behind one Arc.
pub struct AppState {
    pub config: AppConfig,
    pub store: VersionedStore,
    pub coordinator: FetchCoordinator,
    pub gateway: NotificationGateway,
    pub lifecycle: Arc<LifecycleManager>,
}

/// Accept loop. Binds the configured listen address and serves until the
/// listener itself fails.
pub async fn run(state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(state.config.listen).await?;

    info!("outpost listening on {} fronting {}", state.config.listen, state.config.origin);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    debug!("[{}] {} {}", addr, parts.method, target);

    if let Some(tag) = trigger_tag(parts.uri.path()) {
        if parts.method != Method::POST {
            return Ok(plain_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "trigger dispatch accepts POST only",
            ));
        }
        let tag = tag.to_string();
        let payload = body.collect().await?.to_bytes();
        let payload = if payload.is_empty() { None } else { Some(payload) };
        let ack = state.gateway.on_trigger(&tag, payload.as_deref()).await;
        return Ok(json_response(StatusCode::OK, &ack));
    }

    if parts.method == Method::GET && parts.uri.path() == HEALTH_PATH {
        return Ok(health_response(&state).await);
    }

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let payload = body.collect().await?.to_bytes();
    let request = RequestDescriptor {
        method: parts.method.as_str().to_string(),
        url: target,
        headers,
        body: if payload.is_empty() { None } else { Some(payload) },
    };

    let response = state.coordinator.handle(request).await;
    Ok(to_http(response))
}

/// Extract the trigger tag from a control path, if this is one.
fn trigger_tag(path: &str) -> Option<&str> {
    path.strip_prefix(TRIGGER_PREFIX).map(|tag| tag.trim_matches('/'))
}

async fn health_response(state: &AppState) -> Response<Full<Bytes>> {
    let generation = state.store.current_generation().await.ok().flatten();
    let status = json!({
        "phase": state.lifecycle.phase().to_string(),
        "generation": generation,
        "origin": state.config.origin,
    });
    json_response(StatusCode::OK, &status)
}

/// Lower a coordinator response onto the wire, tagging which side served
/// it. A descriptor carrying an unassemblable header answers 500 rather
/// than dropping the connection.
fn to_http(descriptor: ResponseDescriptor) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(descriptor.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Response::builder().status(status);
    for (name, value) in &descriptor.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder = builder.header(SERVED_FROM_HEADER, descriptor.served_from.as_str());

    match builder.body(Full::new(descriptor.body)) {
        Ok(response) => response,
        Err(err) => {
            error!("failed to assemble response: {}", err);
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal proxy error")
        }
    }
}

fn plain_response(status: StatusCode, message: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain"),
    );
    response
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(value).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ServedFrom;

    #[test]
    fn test_trigger_tag_extraction() {
        assert_eq!(trigger_tag("/-/trigger/update"), Some("update"));
        assert_eq!(trigger_tag("/-/trigger/background-search"), Some("background-search"));
        assert_eq!(trigger_tag("/-/trigger/push/"), Some("push"));
        assert_eq!(trigger_tag("/-/trigger/"), Some(""));
        assert_eq!(trigger_tag("/-/health"), None);
        assert_eq!(trigger_tag("/static/css/style.css"), None);
        assert_eq!(trigger_tag("/"), None);
    }

    #[test]
    fn test_to_http_tags_served_from() {
        let descriptor = ResponseDescriptor {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from_static(b"<html></html>"),
            served_from: ServedFrom::Cache,
        };

        let response = to_http(descriptor);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SERVED_FROM_HEADER], "cache");
        assert_eq!(response.headers()["content-type"], "text/html");
    }

    #[test]
    fn test_to_http_network_side() {
        let descriptor = ResponseDescriptor {
            status: 502,
            headers: Vec::new(),
            body: Bytes::from_static(b"Bad gateway - origin unreachable"),
            served_from: ServedFrom::Network,
        };

        let response = to_http(descriptor);

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[SERVED_FROM_HEADER], "network");
    }

    #[test]
    fn test_to_http_invalid_status_maps_to_500() {
        let descriptor = ResponseDescriptor {
            status: 99,
            headers: Vec::new(),
            body: Bytes::new(),
            served_from: ServedFrom::Network,
        };

        assert_eq!(to_http(descriptor).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_plain_response_sets_content_type() {
        let response = plain_response(StatusCode::METHOD_NOT_ALLOWED, "nope");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["content-type"], "text/plain");
    }

    #[test]
    fn test_json_response_shape() {
        let response = json_response(StatusCode::OK, &json!({"ok": true}));
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
