//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    CHANGES_SENT_TOTAL, CLIENT_CONNECTIONS_OPENED, CLIENT_RECONNECTS_SCHEDULED,
    MODEL_REGISTRATIONS, SEND_FAILURES_TOTAL, VIEW_COMMANDS_TOTAL, WS_CONNECTIONS_ACCEPTED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Server-side connection handler metrics
pub struct SyncMetrics;

impl SyncMetrics {
    pub fn record_accepted() {
        WS_CONNECTIONS_ACCEPTED.inc();
    }

    pub fn record_registered() {
        MODEL_REGISTRATIONS.inc();
    }

    pub fn record_released() {
        MODEL_REGISTRATIONS.dec();
    }

    pub fn record_change_sent() {
        CHANGES_SENT_TOTAL.inc();
    }

    pub fn record_socket_closed() {
        SEND_FAILURES_TOTAL.with_label_values(&["socket_closed"]).inc();
    }

    pub fn record_send_failed() {
        SEND_FAILURES_TOTAL.with_label_values(&["send_failed"]).inc();
    }

    pub fn record_view_command() {
        VIEW_COMMANDS_TOTAL.inc();
    }
}

/// Client connection manager metrics
pub struct ClientMetrics;

impl ClientMetrics {
    pub fn record_opened() {
        CLIENT_CONNECTIONS_OPENED.inc();
    }

    pub fn record_reconnect_scheduled() {
        CLIENT_RECONNECTS_SCHEDULED.inc();
    }
}
