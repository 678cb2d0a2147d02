//! Prometheus metrics for healthgate.
//!
//! Covers probe outcomes and latency, the lifecycle phase and the
//! health endpoints themselves.

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

use crate::health::Outcome;
use crate::lifecycle::Phase;

/// Prometheus metrics registry with all application metrics.
pub struct Metrics {
    registry: Registry,

    // === Probe Metrics ===
    /// Probe invocations by probe name and result
    pub probe_checks_total: CounterVec,

    /// Probe latency in seconds
    pub probe_duration_seconds: HistogramVec,

    // === Lifecycle Metrics ===
    /// Current lifecycle phase (0=starting, 1=serving, 2=draining, 3=stopped)
    pub lifecycle_phase: Gauge,

    // === HTTP Metrics ===
    /// Total HTTP requests by endpoint, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration in seconds
    pub http_request_duration_seconds: HistogramVec,

    /// Active HTTP connections
    pub http_connections_active: Gauge,
}

impl Metrics {
    /// Create a new metrics registry with all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Probe and request latency buckets (in seconds)
        let latency_buckets = vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ];

        let probe_checks_total = CounterVec::new(
            Opts::new("healthgate_probe_checks_total", "Total probe invocations"),
            &["probe", "result"],
        )?;
        registry.register(Box::new(probe_checks_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "healthgate_probe_duration_seconds",
                "Probe latency in seconds",
            )
            .buckets(latency_buckets.clone()),
            &["probe"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let lifecycle_phase = Gauge::new(
            "healthgate_lifecycle_phase",
            "Lifecycle phase (0=starting, 1=serving, 2=draining, 3=stopped)",
        )?;
        registry.register(Box::new(lifecycle_phase.clone()))?;

        let http_requests_total = CounterVec::new(
            Opts::new("healthgate_http_requests_total", "Total HTTP requests"),
            &["endpoint", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "healthgate_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(latency_buckets),
            &["endpoint"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let http_connections_active = Gauge::new(
            "healthgate_http_connections_active",
            "Active HTTP connections",
        )?;
        registry.register(Box::new(http_connections_active.clone()))?;

        Ok(Self {
            registry,
            probe_checks_total,
            probe_duration_seconds,
            lifecycle_phase,
            http_requests_total,
            http_request_duration_seconds,
            http_connections_active,
        })
    }

    /// Record one probe outcome.
    pub fn record_probe(&self, probe: &str, outcome: &Outcome) {
        let result = match outcome.error {
            Some(ref e) if e.is_timeout() => "timeout",
            Some(_) => "error",
            None => outcome.status.as_str(),
        };

        self.probe_checks_total
            .with_label_values(&[probe, result])
            .inc();
        self.probe_duration_seconds
            .with_label_values(&[probe])
            .observe(outcome.latency.as_secs_f64());
    }

    /// Record the current lifecycle phase.
    pub fn set_phase(&self, phase: Phase) {
        self.lifecycle_phase.set(phase as u8 as f64);
    }

    /// Record HTTP request metrics.
    pub fn record_http_request(&self, endpoint: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();

        self.http_requests_total
            .with_label_values(&[endpoint, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    /// Increment active connections.
    pub fn inc_connections(&self) {
        self.http_connections_active.inc();
    }

    /// Decrement active connections.
    pub fn dec_connections(&self) {
        self.http_connections_active.dec();
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
