//! Request statistics.
//!
//! Handlers report into a [`StatsSink`] held by the application state.
//! [`PrometheusStats`] is the production sink; it owns its registry, so
//! several routers (as in tests) never share counters.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping
//! and must be network-restricted at the infrastructure level.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Destination of per-request statistics.
pub trait StatsSink: Send + Sync + 'static {
    /// Record one handled request.
    fn record_request(&self, verb: &'static str, status: u16, elapsed: Duration);

    /// Count bytes received from clients.
    fn add_bytes_in(&self, bytes: u64);

    /// Count bytes sent to clients.
    fn add_bytes_out(&self, bytes: u64);

    /// Count an upload rejected for a checksum mismatch.
    fn record_checksum_mismatch(&self);

    /// Text exposition of everything recorded, if the sink can render one.
    fn export(&self) -> Option<Result<Vec<u8>, prometheus::Error>> {
        None
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn record_request(&self, _verb: &'static str, _status: u16, _elapsed: Duration) {}
    fn add_bytes_in(&self, _bytes: u64) {}
    fn add_bytes_out(&self, _bytes: u64) {}
    fn record_checksum_mismatch(&self) {}
}

/// Prometheus-backed statistics.
pub struct PrometheusStats {
    registry: Registry,
    requests: IntCounterVec,
    request_duration: HistogramVec,
    bytes_in: IntCounter,
    bytes_out: IntCounter,
    checksum_mismatches: IntCounter,
}

impl PrometheusStats {
    /// Create the metrics and register them with a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("silo_requests_total", "Total chunk requests by verb and status"),
            &["verb", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "silo_request_duration_seconds",
                "Time taken to handle a chunk request",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["verb"],
        )?;
        let bytes_in = IntCounter::new("silo_bytes_in_total", "Total chunk bytes received")?;
        let bytes_out = IntCounter::new("silo_bytes_out_total", "Total chunk bytes sent")?;
        let checksum_mismatches = IntCounter::new(
            "silo_checksum_mismatches_total",
            "Total uploads rejected because the body did not match the declared checksum",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(bytes_in.clone()))?;
        registry.register(Box::new(bytes_out.clone()))?;
        registry.register(Box::new(checksum_mismatches.clone()))?;

        Ok(Self {
            registry,
            requests,
            request_duration,
            bytes_in,
            bytes_out,
            checksum_mismatches,
        })
    }

    /// The registry holding this sink's metrics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl StatsSink for PrometheusStats {
    fn record_request(&self, verb: &'static str, status: u16, elapsed: Duration) {
        self.requests
            .with_label_values(&[verb, &status.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[verb])
            .observe(elapsed.as_secs_f64());
    }

    fn add_bytes_in(&self, bytes: u64) {
        self.bytes_in.inc_by(bytes);
    }

    fn add_bytes_out(&self, bytes: u64) {
        self.bytes_out.inc_by(bytes);
    }

    fn record_checksum_mismatch(&self) {
        self.checksum_mismatches.inc();
    }

    fn export(&self) -> Option<Result<Vec<u8>, prometheus::Error>> {
        let mut buffer = Vec::new();
        Some(
            TextEncoder::new()
                .encode(&self.registry.gather(), &mut buffer)
                .map(|()| buffer),
        )
    }
}

/// Handler for the `/metrics` endpoint.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.stats.export() {
        Some(Ok(buffer)) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Some(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [("content-type", "text/plain; charset=utf-8")],
            b"statistics are not exported".to_vec(),
        ),
    }
}
