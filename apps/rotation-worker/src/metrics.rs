//! Rotation metrics.
//!
//! One `RotationMetrics` aggregator is constructed at startup and handed to
//! the pipeline and the operational server. Counters and histograms are
//! internally synchronized; callers never lock.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for rotation outcomes and durations.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RotationLabels {
    /// Handler that performed the rotation
    pub handler: String,
    /// Target secret resource name
    pub secret_id: String,
}

/// Labels for rotation errors.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RotationErrorLabels {
    /// Error category
    pub error: String,
    /// Target secret resource name
    pub secret_id: String,
    /// Handler name, empty when the failure happened before resolution
    pub handler: String,
}

pub struct RotationMetrics {
    registry: Registry,
    rotation_count: Family<RotationLabels, Counter>,
    rotation_duration_seconds: Family<RotationLabels, Histogram>,
    rotation_error_count: Family<RotationErrorLabels, Counter>,
}

impl Default for RotationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationMetrics {
    /// Create an aggregator with all series registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let rotation_count = Family::<RotationLabels, Counter>::default();
        registry.register(
            "secret_rotation_count",
            "Number of secret rotations processed",
            rotation_count.clone(),
        );

        let rotation_duration_seconds =
            Family::<RotationLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.005, 2.0, 12))
            });
        registry.register(
            "secret_rotation_duration_seconds",
            "Duration of secret rotation handling in seconds",
            rotation_duration_seconds.clone(),
        );

        let rotation_error_count = Family::<RotationErrorLabels, Counter>::default();
        registry.register(
            "secret_rotation_error_count",
            "Number of errors encountered during secret rotations",
            rotation_error_count.clone(),
        );

        Self {
            registry,
            rotation_count,
            rotation_duration_seconds,
            rotation_error_count,
        }
    }

    /// Record one successful rotation.
    pub fn record_success(&self, handler: &str, secret_id: &str) {
        self.rotation_count
            .get_or_create(&RotationLabels {
                handler: handler.to_string(),
                secret_id: secret_id.to_string(),
            })
            .inc();
    }

    /// Observe how long one rotation attempt took, success or failure.
    pub fn observe_duration(&self, handler: &str, secret_id: &str, seconds: f64) {
        self.rotation_duration_seconds
            .get_or_create(&RotationLabels {
                handler: handler.to_string(),
                secret_id: secret_id.to_string(),
            })
            .observe(seconds);
    }

    /// Record one failed rotation attempt. `handler` is empty when the
    /// failure happened before a handler was resolved.
    pub fn record_error(&self, error: &str, secret_id: &str, handler: &str) {
        self.rotation_error_count
            .get_or_create(&RotationErrorLabels {
                error: error.to_string(),
                secret_id: secret_id.to_string(),
                handler: handler.to_string(),
            })
            .inc();
    }

    /// Current success count for a (handler, secret) pair.
    pub fn success_count(&self, handler: &str, secret_id: &str) -> u64 {
        self.rotation_count
            .get_or_create(&RotationLabels {
                handler: handler.to_string(),
                secret_id: secret_id.to_string(),
            })
            .get()
    }

    /// Current error count for an (error, secret, handler) triple.
    pub fn error_count(&self, error: &str, secret_id: &str, handler: &str) -> u64 {
        self.rotation_error_count
            .get_or_create(&RotationErrorLabels {
                error: error.to_string(),
                secret_id: secret_id.to_string(),
                handler: handler.to_string(),
            })
            .get()
    }

    /// Encode all series in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("failed to encode metrics");
        buffer
    }
}
