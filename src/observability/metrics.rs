//! Metrics collection and exposition.
//!
//! # Metrics
//! - `watchgate_connections_accepted_total` (counter): accepted connections
//! - `watchgate_active_connections` (gauge): current connection count
//! - `watchgate_coordination_transitions_total` (counter): session state
//!   changes, labelled by the state entered
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations behind the `metrics` facade)
//! - Recording works with or without an installed exporter

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::coord::SessionState;

/// Install the Prometheus exporter on the given address.
///
/// Failure to install is logged, not fatal: the service keeps running
/// without exposition.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

pub(crate) fn record_accepted() {
    counter!("watchgate_connections_accepted_total").increment(1);
}

pub(crate) fn connection_opened() {
    gauge!("watchgate_active_connections").increment(1.0);
}

pub(crate) fn connection_closed() {
    gauge!("watchgate_active_connections").decrement(1.0);
}

pub(crate) fn record_coordination_transition(state: SessionState) {
    let label = match state {
        SessionState::NotStarted => "not-started",
        SessionState::Connecting => "connecting",
        SessionState::Connected => "connected",
        SessionState::Disconnected => "disconnected",
        SessionState::Closed => "closed",
    };
    counter!("watchgate_coordination_transitions_total", "state" => label).increment(1);
}
