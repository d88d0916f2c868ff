//! Prometheus Metrics Module
//!
//! Exposes ingestion metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: raw frames received, records parsed, parse failures by kind
//! - **Sinks**: records stored, storage failures, broadcast failures, flushes
//! - **Connection**: connect attempts, reconnects, client state
//!
//! # Integration
//!
//! Metrics are served at `/metrics` on `INGESTOR_METRICS_PORT` when non-zero.
//! The reconnect counter is the hook for alerting on a feed that keeps
//! dropping; nothing inside the client gives up on its own by default.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::streaming::ClientState;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Initialize the Prometheus exporter on `port`.
///
/// Port `0` disables the exporter; the recording functions then become
/// no-ops. Calling this more than once is harmless.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a recorder is already
/// installed by someone else. Must be called from within a Tokio runtime.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if port == 0 || INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()?;

    register_metrics();
    let _ = INSTALLED.set(());
    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "binance_ingestor_frames_received_total",
        "Total text frames received from the exchange"
    );
    describe_counter!(
        "binance_ingestor_records_parsed_total",
        "Total frames parsed into trade records"
    );
    describe_counter!(
        "binance_ingestor_parse_failures_total",
        "Total frames discarded by failure kind"
    );

    describe_counter!(
        "binance_ingestor_records_stored_total",
        "Total records accepted by the storage sink"
    );
    describe_counter!(
        "binance_ingestor_storage_failures_total",
        "Total records the storage sink rejected"
    );
    describe_counter!(
        "binance_ingestor_broadcast_failures_total",
        "Total broadcast publishes that failed"
    );
    describe_counter!(
        "binance_ingestor_batch_flushes_total",
        "Total accumulator flushes"
    );
    describe_counter!(
        "binance_ingestor_records_dropped_total",
        "Buffered trades not stored before the shutdown grace period elapsed"
    );
    describe_histogram!(
        "binance_ingestor_flush_seconds",
        "Time to hand one flush to the storage sink"
    );

    describe_counter!(
        "binance_ingestor_connect_attempts_total",
        "Total connect attempts"
    );
    describe_counter!(
        "binance_ingestor_reconnects_total",
        "Total reconnection waits after a failure or drop"
    );
    describe_gauge!(
        "binance_ingestor_client_state",
        "Client state code (0 idle .. 5 stopped)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a raw frame received.
pub fn record_frame_received() {
    counter!("binance_ingestor_frames_received_total").increment(1);
}

/// Record a frame parsed into a trade record.
pub fn record_record_parsed() {
    counter!("binance_ingestor_records_parsed_total").increment(1);
}

/// Record a discarded frame.
pub fn record_parse_failure(kind: &'static str) {
    counter!("binance_ingestor_parse_failures_total", "kind" => kind).increment(1);
}

/// Record a record accepted by storage.
pub fn record_record_stored() {
    counter!("binance_ingestor_records_stored_total").increment(1);
}

/// Record a storage failure.
pub fn record_storage_failure() {
    counter!("binance_ingestor_storage_failures_total").increment(1);
}

/// Record a broadcast failure.
pub fn record_broadcast_failure() {
    counter!("binance_ingestor_broadcast_failures_total").increment(1);
}

/// Record one accumulator flush and how long storage took.
pub fn record_batch_flush(duration: Duration) {
    counter!("binance_ingestor_batch_flushes_total").increment(1);
    histogram!("binance_ingestor_flush_seconds").record(duration.as_secs_f64());
}

/// Record buffered records abandoned at shutdown.
pub fn record_records_dropped(count: u64) {
    counter!("binance_ingestor_records_dropped_total").increment(count);
}

/// Record a connect attempt.
pub fn record_connect_attempt() {
    counter!("binance_ingestor_connect_attempts_total").increment(1);
}

/// Record a reconnection wait.
pub fn record_reconnect() {
    counter!("binance_ingestor_reconnects_total").increment(1);
}

/// Update the client state gauge.
pub fn set_client_state(state: ClientState) {
    gauge!("binance_ingestor_client_state").set(f64::from(state.code()));
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    #[test]
    fn counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_frame_received();
            record_frame_received();
            record_parse_failure("malformed_frame");
            record_records_dropped(2);
            set_client_state(ClientState::Streaming);
        });

        let rendered = handle.render();
        assert!(rendered.contains("binance_ingestor_frames_received_total 2"));
        assert!(rendered.contains(r#"binance_ingestor_parse_failures_total{kind="malformed_frame"} 1"#));
        assert!(rendered.contains("binance_ingestor_records_dropped_total 2"));
        assert!(rendered.contains("binance_ingestor_client_state 2"));
    }

    #[test]
    fn disabled_port_is_noop() {
        assert!(init_metrics(0).is_ok());
    }
}
