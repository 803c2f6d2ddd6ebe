//! Prometheus recorder for the aggregated request metrics.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "stickerize_requests_total";
    pub const SENDER_COUNTRY_TOTAL: &str = "stickerize_sender_country_total";
    pub const INITIAL_BYTES: &str = "stickerize_initial_bytes";
    pub const FINAL_BYTES: &str = "stickerize_final_bytes";
    pub const EVENTS_TOTAL: &str = "stickerize_telemetry_events_total";
}

/// Byte-length buckets, 10KB to 16MB.
pub const BYTE_BUCKETS: &[f64] = &[
    10_000.0,
    50_000.0,
    100_000.0,
    250_000.0,
    500_000.0,
    750_000.0,
    1_024_000.0,
    2_097_000.0,
    4_000_000.0,
    8_000_000.0,
    16_000_000.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Suffix("_bytes".to_string()),
        BYTE_BUCKETS,
    )
}

/// Install the global Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

#[cfg(test)]
pub(crate) fn local_recorder() -> metrics_exporter_prometheus::PrometheusRecorder {
    builder().unwrap().build_recorder()
}
