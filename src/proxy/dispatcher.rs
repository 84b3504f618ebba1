// ────────────────────────────────
// src/proxy/dispatcher.rs
// Round-robin selection with failover, bounded by the backend count.
// ────────────────────────────────
use hyper::{Body, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::backend::Backend;
use super::forward::{Forwarder, OutboundRequest};
use crate::load_balancer::BackendRegistry;
use crate::metrics::MetricsCollector;

/// What the dispatcher should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterFailure {
    Retry,
    Exhausted,
}

/// Per-request attempt bookkeeping.
///
/// Invariant: `attempts <= limit`, where `limit` is the registry size. Once
/// `limit` transport failures are recorded the request is exhausted.
#[derive(Debug)]
pub struct DispatchAttempt {
    limit: usize,
    attempts: usize,
    failures: usize,
    current: Option<usize>,
}

impl DispatchAttempt {
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "dispatch needs at least one backend");
        Self {
            limit,
            attempts: 0,
            failures: 0,
            current: None,
        }
    }

    /// Marks `index` as the backend for the next attempt.
    pub fn select(&mut self, index: usize) {
        assert!(
            self.attempts < self.limit,
            "attempt {} exceeds limit {}",
            self.attempts + 1,
            self.limit
        );
        self.attempts += 1;
        self.current = Some(index);
    }

    pub fn record_failure(&mut self) -> AfterFailure {
        self.failures += 1;
        if self.failures >= self.limit {
            AfterFailure::Exhausted
        } else {
            AfterFailure::Retry
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }
}

pub enum DispatchOutcome {
    /// A backend produced an HTTP response, whatever its status.
    Succeeded {
        backend: Arc<Backend>,
        response: Response<Body>,
        attempts: usize,
    },
    /// Every attempt failed at the transport level.
    Exhausted {
        last_backend: Arc<Backend>,
        attempts: usize,
    },
}

pub struct Dispatcher<F> {
    registry: Arc<BackendRegistry>,
    forwarder: F,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<F: Forwarder> Dispatcher<F> {
    pub fn new(registry: Arc<BackendRegistry>, forwarder: F) -> Self {
        Self {
            registry,
            forwarder,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, request: &OutboundRequest) -> DispatchOutcome {
        let mut attempt = DispatchAttempt::new(self.registry.size());

        loop {
            let index = self.registry.next();
            attempt.select(index);
            let backend = self.registry.backend(index);

            let started = Instant::now();
            let result = self.forwarder.forward(backend, request).await;
            self.record_attempt(backend, result.is_ok(), started);

            match result {
                Ok(response) => {
                    debug!(
                        backend = %backend.address(),
                        status = response.status().as_u16(),
                        attempt = attempt.attempts(),
                        "backend responded"
                    );
                    return DispatchOutcome::Succeeded {
                        backend: backend.clone(),
                        response,
                        attempts: attempt.attempts(),
                    };
                }
                Err(err) => {
                    warn!(
                        backend = %backend.address(),
                        attempt = attempt.attempts(),
                        error = %err,
                        "backend unreachable"
                    );
                    if attempt.record_failure() == AfterFailure::Exhausted {
                        return DispatchOutcome::Exhausted {
                            last_backend: backend.clone(),
                            attempts: attempt.attempts(),
                        };
                    }
                    debug!("retrying with next backend");
                }
            }
        }
    }

    fn record_attempt(&self, backend: &Backend, success: bool, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_backend_attempt(&backend.id, success, started.elapsed());
        }
    }
}
