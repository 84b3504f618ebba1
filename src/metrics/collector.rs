// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Text exposition of everything registered.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Request metrics
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,

    // Backend metrics
    pub backend_attempts_total: IntCounterVec,
    pub backend_attempt_duration_seconds: HistogramVec,

    pub total_backends: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("argus_requests_total", "Total number of requests"),
            &["method", "status_code", "backend", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "argus_request_duration_seconds",
                "Request duration in seconds",
            ),
            &["method", "status_code", "backend"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let backend_attempts_total = IntCounterVec::new(
            Opts::new(
                "argus_backend_attempts_total",
                "Forward attempts per backend",
            ),
            &["backend", "result"],
        )?;
        registry.register(Box::new(backend_attempts_total.clone()))?;

        let backend_attempt_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "argus_backend_attempt_duration_seconds",
                "Time until a backend answered or failed",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(backend_attempt_duration_seconds.clone()))?;

        let total_backends = IntGauge::new("argus_backends_total", "Configured backends")?;
        registry.register(Box::new(total_backends.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            backend_attempts_total,
            backend_attempt_duration_seconds,
            total_backends,
        })
    }

    pub fn record_request(
        &self,
        method: &str,
        status_code: u16,
        backend: &str,
        outcome: &str,
        duration: Duration,
    ) {
        let status = status_code.to_string();
        self.requests_total
            .with_label_values(&[method, &status, backend, outcome])
            .inc();

        self.request_duration_seconds
            .with_label_values(&[method, &status, backend])
            .observe(duration.as_secs_f64());
    }

    pub fn record_backend_attempt(&self, backend: &str, success: bool, duration: Duration) {
        let result = if success { "success" } else { "failure" };
        self.backend_attempts_total
            .with_label_values(&[backend, result])
            .inc();

        self.backend_attempt_duration_seconds
            .with_label_values(&[backend])
            .observe(duration.as_secs_f64());
    }

    pub fn set_backend_count(&self, total: usize) {
        self.total_backends.set(total as i64);
    }
}
