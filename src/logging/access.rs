// src/logging/access.rs
use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics::MetricsCollector;
use crate::proxy::{OutcomeKind, OutcomeSink, RequestOutcome};

/// Writes one access record per request, and feeds request metrics when
/// they are enabled.
#[derive(Default)]
pub struct AccessLog {
    metrics: Option<Arc<MetricsCollector>>,
}

impl AccessLog {
    pub fn new(metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self { metrics }
    }
}

impl OutcomeSink for AccessLog {
    fn record(&self, outcome: RequestOutcome) {
        let duration_ms = outcome.duration.as_secs_f64() * 1000.0;

        match outcome.kind {
            OutcomeKind::Relayed => info!(
                target: "argus::access",
                method = %outcome.method,
                url = %outcome.url,
                backend = %outcome.backend,
                status = outcome.status.as_u16(),
                attempts = outcome.attempts,
                duration_ms,
                "request forwarded"
            ),
            OutcomeKind::RelayFailed => warn!(
                target: "argus::access",
                method = %outcome.method,
                url = %outcome.url,
                backend = %outcome.backend,
                status = outcome.status.as_u16(),
                attempts = outcome.attempts,
                duration_ms,
                error = outcome.error.as_deref().unwrap_or(""),
                "error writing response"
            ),
            OutcomeKind::Exhausted => warn!(
                target: "argus::access",
                method = %outcome.method,
                url = %outcome.url,
                backend = %outcome.backend,
                status = outcome.status.as_u16(),
                attempts = outcome.attempts,
                duration_ms,
                "all backend servers are down"
            ),
            OutcomeKind::Rejected => warn!(
                target: "argus::access",
                method = %outcome.method,
                url = %outcome.url,
                status = outcome.status.as_u16(),
                duration_ms,
                error = outcome.error.as_deref().unwrap_or(""),
                "request rejected"
            ),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_request(
                outcome.method.as_str(),
                outcome.status.as_u16(),
                &outcome.backend_id,
                outcome.kind.as_str(),
                outcome.duration,
            );
        }
    }
}
