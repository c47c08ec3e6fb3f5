//! Prometheus metrics for feed health and simulation latency.
//!
//! This module provides metrics for:
//! - WebSocket message throughput, processing latency and reconnects
//! - Book updates applied and levels rejected
//! - Simulations run, partial fills and simulation latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

use crate::simulator::Direction;

// === Metric Name Constants ===

/// WebSocket message latency metric name.
pub const METRIC_WS_MESSAGE_LATENCY: &str = "ws_message_latency_ms";
/// Simulation latency metric name.
pub const METRIC_SIMULATION_LATENCY: &str = "simulation_latency_ms";
/// WebSocket messages received counter metric name.
pub const METRIC_WS_MESSAGES_RECEIVED: &str = "ws_messages_received_total";
/// WebSocket reconnects counter metric name.
pub const METRIC_WS_RECONNECTS: &str = "ws_reconnects_total";
/// Book updates applied counter metric name.
pub const METRIC_BOOK_UPDATES_APPLIED: &str = "book_updates_applied_total";
/// Rejected levels counter metric name.
pub const METRIC_LEVELS_REJECTED: &str = "levels_rejected_total";
/// Simulations counter metric name.
pub const METRIC_SIMULATIONS: &str = "simulations_total";
/// Partial fills counter metric name.
pub const METRIC_PARTIAL_FILLS: &str = "partial_fills_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_WS_MESSAGE_LATENCY,
        "WebSocket message processing latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SIMULATION_LATENCY,
        "Time to walk the book for one simulated order in milliseconds"
    );

    describe_counter!(
        METRIC_WS_MESSAGES_RECEIVED,
        "Total number of WebSocket messages received"
    );
    describe_counter!(
        METRIC_WS_RECONNECTS,
        "Total number of WebSocket reconnections"
    );
    describe_counter!(
        METRIC_BOOK_UPDATES_APPLIED,
        "Total number of feed messages applied to the book"
    );
    describe_counter!(
        METRIC_LEVELS_REJECTED,
        "Total number of malformed or non-positive levels dropped"
    );
    describe_counter!(METRIC_SIMULATIONS, "Total number of simulated market orders");
    describe_counter!(
        METRIC_PARTIAL_FILLS,
        "Total number of simulations that exhausted book depth"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return a handle for rendering.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record WebSocket message processing latency.
pub fn record_ws_message_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_WS_MESSAGE_LATENCY).record(latency_ms);
}

/// Increment WebSocket messages received counter.
pub fn inc_ws_messages_received() {
    counter!(METRIC_WS_MESSAGES_RECEIVED).increment(1);
}

/// Increment WebSocket reconnects counter.
pub fn inc_ws_reconnects() {
    counter!(METRIC_WS_RECONNECTS).increment(1);
}

/// Increment book updates applied counter.
pub fn inc_book_updates_applied() {
    counter!(METRIC_BOOK_UPDATES_APPLIED).increment(1);
}

/// Increment rejected levels counter.
pub fn inc_levels_rejected() {
    counter!(METRIC_LEVELS_REJECTED).increment(1);
}

/// Increment simulations counter for a direction.
pub fn inc_simulations(direction: Direction) {
    counter!(METRIC_SIMULATIONS, "direction" => direction.to_string()).increment(1);
}

/// Increment partial fills counter.
pub fn inc_partial_fills() {
    counter!(METRIC_PARTIAL_FILLS).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for one simulated order.
pub fn timer_simulation() -> LatencyTimer {
    LatencyTimer::new(METRIC_SIMULATION_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        init_metrics();
        inc_simulations(Direction::Buy);
        inc_partial_fills();
        drop(timer_simulation());
    }
}
