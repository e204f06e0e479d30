//! Service metrics
//!
//! # Metrics
//!
//! - `loginapp_request_total`: counter of HTTP requests by `code` and `method`
//! - `loginapp_request_duration_seconds`: histogram of request latency by
//!   `code` and `method`
//! - `loginapp_discovery_attempts_total`: counter of discovery bootstraps
//! - `loginapp_discovery_retries_total`: counter of failed discovery attempts
//! - `loginapp_reloads_total`: counter of configuration reloads by `result`
//!
//! Recording is always on; exposing the values requires the `prometheus`
//! feature and [`init_metrics_exporter`].

use metrics::{histogram, increment_counter};
use std::time::Duration;

/// Record one served HTTP request.
///
/// # Examples
///
/// ```
/// use loginapp::metrics::record_request;
/// use std::time::Duration;
///
/// record_request("GET", 200, Duration::from_millis(12));
/// ```
pub fn record_request(method: &str, status: u16, duration: Duration) {
    increment_counter!(
        "loginapp_request_total",
        "code" => status.to_string(),
        "method" => method.to_string()
    );

    histogram!(
        "loginapp_request_duration_seconds",
        duration.as_secs_f64(),
        "code" => status.to_string(),
        "method" => method.to_string()
    );
}

/// Result of a configuration reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadResult {
    Success,
    Failure,
}

impl ReloadResult {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Record the outcome of a reload.
pub fn record_reload(result: ReloadResult) {
    increment_counter!("loginapp_reloads_total", "result" => result.as_str());
}

/// Start the Prometheus exporter on `0.0.0.0:<port>`.
///
/// Without the `prometheus` feature this only logs that metrics are not
/// exported. Failure to install is logged and otherwise ignored; the login
/// flow does not depend on metrics.
pub fn init_metrics_exporter(port: u16) {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        match PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
        {
            Ok(()) => tracing::info!("Metrics exporter listening on 0.0.0.0:{}", port),
            Err(e) => tracing::warn!("Failed to install Prometheus exporter: {}", e),
        }
    }

    #[cfg(not(feature = "prometheus"))]
    tracing::debug!(
        "Built without the prometheus feature, metrics are not exported on port {}",
        port
    );
}
