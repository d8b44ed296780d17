//! Metrics service for relay monitoring

use std::sync::Arc;
use std::time::Duration;

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

use crate::error::{ApiError, Result};

/// Outcome label values for `ml_tester_relay_requests_total`
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_REMOTE_ERROR: &str = "remote_error";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_FAILED: &str = "failed";

/// Metrics service for collecting and exposing relay metrics
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,
    pub relay_requests_total: CounterVec,
    pub upstream_duration_seconds: HistogramVec,
}

impl MetricsService {
    /// Create new metrics service
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let relay_requests_total = CounterVec::new(
            Opts::new(
                "ml_tester_relay_requests_total",
                "Total number of relayed requests by target service and outcome",
            ),
            &["service", "outcome"],
        )
        .map_err(|e| {
            ApiError::internal(format!(
                "Failed to create ml_tester_relay_requests_total metric: {}",
                e
            ))
        })?;

        let upstream_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "ml_tester_relay_upstream_duration_seconds",
                "Duration of outbound calls to remote services in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["service"],
        )
        .map_err(|e| {
            ApiError::internal(format!(
                "Failed to create ml_tester_relay_upstream_duration_seconds metric: {}",
                e
            ))
        })?;

        registry
            .register(Box::new(relay_requests_total.clone()))
            .map_err(|e| ApiError::internal(format!("Failed to register metric: {}", e)))?;
        registry
            .register(Box::new(upstream_duration_seconds.clone()))
            .map_err(|e| ApiError::internal(format!("Failed to register metric: {}", e)))?;

        Ok(Self {
            registry,
            relay_requests_total,
            upstream_duration_seconds,
        })
    }

    /// Count one relayed request
    pub fn record_request(&self, service: &str, outcome: &str) {
        self.relay_requests_total
            .with_label_values(&[service, outcome])
            .inc();
    }

    /// Observe the duration of one outbound call
    pub fn record_upstream_duration(&self, service: &str, duration: Duration) {
        self.upstream_duration_seconds
            .with_label_values(&[service])
            .observe(duration.as_secs_f64());
    }

    /// Prometheus text exposition of everything registered
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        match encoder.encode(&self.registry.gather(), &mut buffer) {
            Ok(()) => String::from_utf8(buffer).unwrap_or_default(),
            Err(_) => "# Failed to encode metrics\n".to_string(),
        }
    }
}
