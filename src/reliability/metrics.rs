//! Prometheus metrics collection and export.
//!
//! Queue health, dispatch outcomes and connection activity are recorded
//! through the `metrics` facade; [`PipelineMetrics`] installs the
//! Prometheus recorder and renders the exposition text.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::AppError;

/// Handle to the installed Prometheus recorder.
#[derive(Clone)]
pub struct PipelineMetrics {
    /// Prometheus handle for exporting metrics.
    prometheus_handle: PrometheusHandle,
}

impl PipelineMetrics {
    /// Install the global recorder and describe every metric.
    pub fn install() -> Result<Self, AppError> {
        let prometheus_handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| AppError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

        register_metrics();
        info!("Metrics collection initialized");

        Ok(Self { prometheus_handle })
    }

    /// Get the Prometheus metrics as a string.
    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Register all metrics with their descriptions.
fn register_metrics() {
    // Pipeline
    describe_gauge!(
        "sigstream_queue_depth",
        "Snapshots waiting in the hand-off queue at the last report"
    );
    describe_counter!(
        "sigstream_snapshots_skipped_total",
        "Snapshots dropped because the hand-off queue was full"
    );
    describe_counter!(
        "sigstream_snapshots_processed_total",
        "Snapshots dispatched to every registered session"
    );
    describe_counter!(
        "sigstream_session_failures_total",
        "Sessions disconnected after an analysis or delivery failure"
    );

    // Sessions
    describe_counter!(
        "sigstream_sessions_started_total",
        "Analyzer sessions started, by analyzer"
    );
    describe_gauge!("sigstream_sessions_active", "Sessions with a registered analyzer");
    describe_counter!(
        "sigstream_requests_failed_total",
        "Session requests answered with internal_error"
    );

    // WebSocket
    describe_counter!(
        "websocket_connections_total",
        "Total number of WebSocket connections established"
    );
    describe_gauge!(
        "websocket_connections_active",
        "Number of active WebSocket connections"
    );
    describe_counter!(
        "websocket_messages_total",
        "Total number of WebSocket messages processed"
    );
}

pub fn record_session_started(analyzer: &str) {
    counter!("sigstream_sessions_started_total", "analyzer" => analyzer.to_string()).increment(1);
    gauge!("sigstream_sessions_active").increment(1.0);
}

pub fn record_session_ended() {
    gauge!("sigstream_sessions_active").decrement(1.0);
}

pub fn record_request_failure() {
    counter!("sigstream_requests_failed_total").increment(1);
}

/// Record WebSocket connection events.
pub fn record_websocket_connection() {
    counter!("websocket_connections_total").increment(1);
    gauge!("websocket_connections_active").increment(1.0);
}

pub fn record_websocket_disconnection() {
    gauge!("websocket_connections_active").decrement(1.0);
}

pub fn record_websocket_message() {
    counter!("websocket_messages_total").increment(1);
}
