//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_messages_total` (counter): admissions by outcome
//!   (accepted, dropped, closed, invalid)
//! - `mirror_dispatch_total` (counter): mirrored calls by outcome
//! - `mirror_dispatch_duration_seconds` (histogram): mirrored call latency
//! - `mirror_active_connections` (gauge): open SPOP connections
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::mirror::Admission;

/// Start the Prometheus scrape endpoint. Requires a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_admission(admission: Admission) {
    let outcome = match admission {
        Admission::Accepted => "accepted",
        Admission::Dropped => "dropped",
        Admission::Closed => "closed",
    };
    metrics::counter!("mirror_messages_total", "outcome" => outcome).increment(1);
}

pub fn record_invalid_message() {
    metrics::counter!("mirror_messages_total", "outcome" => "invalid").increment(1);
}

pub fn record_dispatch(success: bool, start: Instant) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!("mirror_dispatch_total", "outcome" => outcome).increment(1);
    metrics::histogram!("mirror_dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("mirror_active_connections").set(count as f64);
}
