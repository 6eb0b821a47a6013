//! Prometheus metrics for model synchronization.
//!
//! - Server connection metrics (accepted sockets, live model registrations)
//! - Outbound change metrics (sent, failures by kind)
//! - Inbound view command metrics
//! - Client reconnect metrics

mod helpers;

pub use helpers::{encode_metrics, ClientMetrics, SyncMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "model_sync";

lazy_static! {
    /// WebSocket connections accepted by the server handler
    pub static ref WS_CONNECTIONS_ACCEPTED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_accepted_total", METRIC_PREFIX),
        "Total WebSocket connections accepted"
    ).unwrap();

    /// Model listener registrations currently held by connections
    pub static ref MODEL_REGISTRATIONS: IntGauge = register_int_gauge!(
        format!("{}_model_registrations", METRIC_PREFIX),
        "Model listener registrations held by live connections"
    ).unwrap();

    /// Model changes written to sockets
    pub static ref CHANGES_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_changes_sent_total", METRIC_PREFIX),
        "Model changes sent to clients"
    ).unwrap();

    /// Failed change sends by kind (socket_closed, send_failed)
    pub static ref SEND_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_send_failures_total", METRIC_PREFIX),
        "Failed change sends by kind",
        &["kind"]
    ).unwrap();

    /// View commands received from clients
    pub static ref VIEW_COMMANDS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_view_commands_total", METRIC_PREFIX),
        "View commands received from clients"
    ).unwrap();

    /// Client connections that reached the open state
    pub static ref CLIENT_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_client_connections_opened_total", METRIC_PREFIX),
        "Client connections opened"
    ).unwrap();

    /// Client reconnect attempts scheduled
    pub static ref CLIENT_RECONNECTS_SCHEDULED: IntCounter = register_int_counter!(
        format!("{}_client_reconnects_scheduled_total", METRIC_PREFIX),
        "Client reconnect attempts scheduled"
    ).unwrap();
}
