//! Prometheus metrics for gantry.
//!
//! One counter and one latency histogram shared by both transports,
//! labeled by handler, protocol and status bucket.

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use regex::Regex;

use super::status::StatusBucket;

/// Global regex for path normalization (compiled once)
static PATH_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_path_regex() -> &'static Regex {
    PATH_REGEX.get_or_init(|| Regex::new(r"/\d+(/|$)").expect("Invalid regex"))
}

/// Transport label values.
pub const PROTOCOL_HTTP: &str = "http";
pub const PROTOCOL_GRPC: &str = "grpc";

/// Prometheus metrics registry with the request metrics.
///
/// Counters are atomics; the struct is shared by `Arc` into every layer.
pub struct Metrics {
    registry: Registry,

    /// Requests by handler, protocol, status bucket
    pub requests_total: CounterVec,

    /// Request latency in seconds
    pub response_time_seconds: HistogramVec,

    /// Open connections per HTTP surface
    pub connections_active: GaugeVec,
}

impl Metrics {
    /// Create a new registry with metric names prefixed by `namespace`.
    pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let buckets = vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ];

        let requests_total = CounterVec::new(
            Opts::new("requests_total", "Total handled requests").namespace(namespace),
            &["handler", "protocol", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let response_time_seconds = HistogramVec::new(
            HistogramOpts::new("response_time_seconds", "Request handling time in seconds")
                .namespace(namespace)
                .buckets(buckets),
            &["handler", "protocol", "status"],
        )?;
        registry.register(Box::new(response_time_seconds.clone()))?;

        let connections_active = GaugeVec::new(
            Opts::new("connections_active", "Open HTTP connections").namespace(namespace),
            &["surface"],
        )?;
        registry.register(Box::new(connections_active.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            response_time_seconds,
            connections_active,
        })
    }

    /// Record one finished request.
    pub fn observe(&self, handler: &str, protocol: &str, status: StatusBucket, elapsed: Duration) {
        let labels = [handler, protocol, status.as_str()];
        self.requests_total.with_label_values(&labels).inc();
        self.response_time_seconds
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
    }

    /// Current counter value for a label tuple.
    pub fn requests_count(&self, handler: &str, protocol: &str, status: StatusBucket) -> u64 {
        self.requests_total
            .with_label_values(&[handler, protocol, status.as_str()])
            .get() as u64
    }

    /// Sum of all counters for one protocol.
    pub fn protocol_total(&self, protocol: &str) -> u64 {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name().ends_with("requests_total"))
            .flat_map(|family| family.get_metric().iter())
            .filter(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|l| l.get_name() == "protocol" && l.get_value() == protocol)
            })
            .map(|metric| metric.get_counter().get_value() as u64)
            .sum()
    }

    /// Increment open connections for a surface.
    pub fn inc_connections(&self, surface: &str) {
        self.connections_active.with_label_values(&[surface]).inc();
    }

    /// Decrement open connections for a surface.
    pub fn dec_connections(&self, surface: &str) {
        self.connections_active.with_label_values(&[surface]).dec();
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Normalize path for metrics (replace IDs with placeholders).
///
/// Examples:
/// - `/users/123` -> `/users/:id`
/// - `/users/123/posts/456` -> `/users/:id/posts/:id`
pub fn normalize_path(path: &str) -> String {
    get_path_regex().replace_all(path, "/:id$1").to_string()
}
