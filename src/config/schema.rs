//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files; every
//! field has a default so a file only needs the values it changes.

use serde::{Deserialize, Serialize};

use crate::mirror::AdmissionPolicy;

/// Root configuration for the mirror agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MirrorConfig {
    /// SPOP listener settings.
    pub listener: ListenerConfig,

    /// Where and how requests are replayed.
    pub mirror: MirrorTargetConfig,

    /// Job queue and worker pool.
    pub queue: QueueConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:12345").
    pub bind_address: String,

    /// Maximum concurrent SPOP connections.
    pub max_connections: usize,

    /// Largest frame the agent accepts; the HELLO exchange may lower it.
    pub max_frame_size: u32,

    /// How long shutdown waits for SPOP connections to close.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:12345".to_string(),
            max_connections: 1024,
            max_frame_size: 16_384,
            drain_timeout_secs: 10,
        }
    }
}

/// Mirror target and outbound client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MirrorTargetConfig {
    /// Base URL requests are replayed against, without a trailing slash.
    pub host: String,

    /// TCP connect (and TLS handshake) timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Total time allowed for one mirrored call in milliseconds.
    pub request_timeout_ms: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub idle_timeout_secs: u64,

    /// Maximum idle pooled connections kept to the mirror host.
    pub max_idle_per_host: usize,
}

impl Default for MirrorTargetConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            connect_timeout_ms: 1000,
            request_timeout_ms: 1000,
            idle_timeout_secs: 90,
            max_idle_per_host: 10_000,
        }
    }
}

/// Job queue and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of concurrent mirror workers.
    pub workers: usize,

    /// Maximum number of pending jobs.
    pub capacity: usize,

    /// Behaviour when the queue is full.
    pub policy: AdmissionPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            capacity: 10_000,
            policy: AdmissionPolicy::Drop,
        }
    }
}

/// Four workers per available core.
fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get()) * 4
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Debug-level logging (worker lifecycle, every dropped job).
    pub debug: bool,

    /// Log every mirrored request and its outcome.
    pub verbose: bool,

    /// Prometheus endpoint bind address; disabled when unset.
    pub metrics_address: Option<String>,
}
