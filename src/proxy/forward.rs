// ────────────────────────────────
// src/proxy/forward.rs
// One outbound attempt against one backend.
// ────────────────────────────────
use async_trait::async_trait;
use hyper::body::{Bytes, HttpBody};
use hyper::client::HttpConnector;
use hyper::header::{self, HeaderMap};
use hyper::http::uri::{InvalidUri, PathAndQuery};
use hyper::{Body, Client, Method, Request, Response};
use std::time::Duration;

use super::backend::Backend;
use super::headers::strip_hop_by_hop;
use crate::config::ForwardMode;

/// Any failure to get an HTTP response out of a backend. The dispatcher treats
/// every variant the same way: try the next backend.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("transport error: {0}")]
    Transport(#[from] hyper::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("invalid target uri: {0}")]
    InvalidTarget(#[from] InvalidUri),

    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),
}

/// Why an inbound request could not be captured for forwarding.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("reading request body failed: {0}")]
    Body(#[from] hyper::Error),

    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// The parts of an inbound request that are replayed on every attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    mode: ForwardMode,
    method: Method,
    path_and_query: Option<PathAndQuery>,
    headers: HeaderMap,
    body: Bytes,
}

impl OutboundRequest {
    /// A bare `GET` of the backend URL.
    pub fn get() -> Self {
        Self {
            mode: ForwardMode::Get,
            method: Method::GET,
            path_and_query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Captures what `mode` needs from `req`. In passthrough mode the body is
    /// buffered once so a retry can send it again; bodies over `max_body`
    /// bytes are refused.
    pub async fn capture(
        req: Request<Body>,
        mode: ForwardMode,
        max_body: usize,
    ) -> Result<Self, CaptureError> {
        match mode {
            ForwardMode::Get => Ok(Self::get()),
            ForwardMode::Passthrough => {
                let (parts, body) = req.into_parts();
                let body = read_capped(body, max_body).await?;

                let mut headers = parts.headers;
                strip_hop_by_hop(&mut headers);
                headers.remove(header::HOST);

                Ok(Self {
                    mode,
                    method: parts.method,
                    path_and_query: parts.uri.path_and_query().cloned(),
                    headers,
                    body,
                })
            }
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Builds the request for one attempt against `backend`.
    pub fn to_request(&self, backend: &Backend) -> Result<Request<Body>, ForwardError> {
        match self.mode {
            ForwardMode::Get => Ok(Request::get(backend.uri().clone()).body(Body::empty())?),
            ForwardMode::Passthrough => {
                let uri = backend.target(self.path_and_query.as_ref())?;
                let mut req = Request::builder()
                    .method(self.method.clone())
                    .uri(uri)
                    .body(Body::from(self.body.clone()))?;
                *req.headers_mut() = self.headers.clone();
                Ok(req)
            }
        }
    }
}

async fn read_capped(mut body: Body, limit: usize) -> Result<Bytes, CaptureError> {
    let too_large = CaptureError::TooLarge { limit };
    if body.size_hint().lower() > limit as u64 {
        return Err(too_large);
    }

    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > limit {
            return Err(too_large);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// Sends one request to one backend.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        backend: &Backend,
        request: &OutboundRequest,
    ) -> Result<Response<Body>, ForwardError>;
}

/// [`Forwarder`] over a hyper client that never keeps idle connections, so
/// each attempt opens its own connection and releases it when done.
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
    attempt_timeout: Option<Duration>,
}

impl HyperForwarder {
    pub fn new(attempt_timeout: Option<Duration>) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .build_http();

        Self {
            client,
            attempt_timeout,
        }
    }
}

#[async_trait]
impl Forwarder for HyperForwarder {
    async fn forward(
        &self,
        backend: &Backend,
        request: &OutboundRequest,
    ) -> Result<Response<Body>, ForwardError> {
        let req = request.to_request(backend)?;
        let pending = self.client.request(req);

        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| ForwardError::Timeout(limit))?
                .map_err(ForwardError::from),
            None => Ok(pending.await?),
        }
    }
}
