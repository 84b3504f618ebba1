// ────────────────────────────────
// src/proxy/proxy.rs
// Proxy component that handles HTTP request forwarding
// ────────────────────────────────

use hyper::{Body, Method, Request, Response, StatusCode, Uri};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use super::backend::Backend;
use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::forward::{CaptureError, Forwarder, HyperForwarder, OutboundRequest};
use super::outcome::{OutcomeKind, OutcomeSink, RequestOutcome, NO_BACKEND};
use super::relay::{self, RelayReport};
use crate::config::{Config, ForwardMode, DEFAULT_MAX_BODY_BYTES};
use crate::load_balancer::{BackendRegistry, RegistryError};
use crate::metrics::MetricsCollector;

/// Body of the response sent when every backend failed.
pub const EXHAUSTED_BODY: &str = "All backend servers are down";

pub struct Proxy<F = HyperForwarder> {
    dispatcher: Dispatcher<F>,
    mode: ForwardMode,
    max_body: usize,
    sink: Arc<dyn OutcomeSink>,
}

impl Proxy<HyperForwarder> {
    /// Builds the registry and hyper forwarder described by `config`.
    pub fn from_config(
        config: &Config,
        sink: Arc<dyn OutcomeSink>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<Self, RegistryError> {
        let registry = Arc::new(BackendRegistry::from_config(&config.backends)?);
        let mut dispatcher = Dispatcher::new(registry, HyperForwarder::new(config.attempt_timeout()));
        if let Some(metrics) = metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }

        Ok(Self::new(dispatcher, config.forward_mode, sink).with_max_body(config.max_body_bytes))
    }
}

impl<F: Forwarder> Proxy<F> {
    pub fn new(dispatcher: Dispatcher<F>, mode: ForwardMode, sink: Arc<dyn OutcomeSink>) -> Self {
        Self {
            dispatcher,
            mode,
            max_body: DEFAULT_MAX_BODY_BYTES,
            sink,
        }
    }

    /// Largest passthrough request body that will be buffered.
    pub fn with_max_body(mut self, limit: usize) -> Self {
        self.max_body = limit;
        self
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        self.dispatcher.registry()
    }

    /// Handles one inbound request. Failures are turned into responses.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %req.method(),
            uri = %req.uri(),
        );

        async move {
            match self.forward(req).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "request failed");
                    err.into()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let started = Instant::now();
        let method = req.method().clone();
        let url = req.uri().clone();

        let outbound = match OutboundRequest::capture(req, self.mode, self.max_body).await {
            Ok(outbound) => outbound,
            Err(err) => {
                let err = ProxyError::from(err);
                self.sink.record(RequestOutcome {
                    method,
                    url,
                    backend: NO_BACKEND.to_string(),
                    backend_id: NO_BACKEND.to_string(),
                    status: err.status(),
                    attempts: 0,
                    duration: started.elapsed(),
                    kind: OutcomeKind::Rejected,
                    error: Some(err.to_string()),
                });
                return Err(err);
            }
        };

        match self.dispatcher.dispatch(&outbound).await {
            DispatchOutcome::Succeeded {
                backend,
                response,
                attempts,
            } => {
                let sink = self.sink.clone();
                let response = relay::relay(response, move |report| {
                    sink.record(relay_outcome(method, url, &backend, attempts, started, report));
                })
                .await;
                Ok(response)
            }
            DispatchOutcome::Exhausted {
                last_backend,
                attempts,
            } => {
                self.sink.record(RequestOutcome {
                    method,
                    url,
                    backend: last_backend.address().to_string(),
                    backend_id: last_backend.id.clone(),
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    attempts,
                    duration: started.elapsed(),
                    kind: OutcomeKind::Exhausted,
                    error: None,
                });
                Err(ProxyError::AllBackendsExhausted { attempts })
            }
        }
    }
}

fn relay_outcome(
    method: Method,
    url: Uri,
    backend: &Backend,
    attempts: usize,
    started: Instant,
    report: RelayReport,
) -> RequestOutcome {
    let (status, kind) = match report.error {
        None => (report.status, OutcomeKind::Relayed),
        Some(_) => (StatusCode::INTERNAL_SERVER_ERROR, OutcomeKind::RelayFailed),
    };

    RequestOutcome {
        method,
        url,
        backend: backend.address().to_string(),
        backend_id: backend.id.clone(),
        status,
        attempts,
        duration: started.elapsed(),
        kind,
        error: report.error.map(|e| e.to_string()),
    }
}

// Custom error type for proxy operations
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("all {attempts} backends failed")]
    AllBackendsExhausted { attempts: usize },

    #[error("failed to read request body: {0}")]
    InboundBody(#[source] hyper::Error),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::AllBackendsExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::InboundBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<CaptureError> for ProxyError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Body(err) => ProxyError::InboundBody(err),
            CaptureError::TooLarge { limit } => ProxyError::PayloadTooLarge { limit },
        }
    }
}

// Convert ProxyError to Hyper Response for error handling
impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let message = match err {
            ProxyError::AllBackendsExhausted { .. } => EXHAUSTED_BODY,
            ProxyError::InboundBody(_) => "Error reading request",
            ProxyError::PayloadTooLarge { .. } => "Request body too large",
        };

        let mut response = Response::new(Body::from(message));
        *response.status_mut() = err.status();
        response
    }
}
