//! HAProxy SPOE mirror agent.
//!
//! # Architecture Overview
//!
//! ```text
//!   HAProxy ──SPOP──▶ net::listener ──▶ spop::agent ──▶ mirror::adapter
//!                                                            │
//!                                                            ▼
//!   shadow  ◀──HTTP── mirror::dispatcher ◀── mirror::pool ◀── mirror::queue
//! ```
//!
//! ```text
//! spoa-mirror --listen 0.0.0.0:20009 --host https://test-system.example.com \
//!             --workers 64 --queue-size 50000 --debug
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use spoa_mirror::config::{read_config, validate_config, MirrorConfig};
use spoa_mirror::lifecycle::signals::wait_for_signal;
use spoa_mirror::lifecycle::{MirrorServer, Shutdown};
use spoa_mirror::mirror::AdmissionPolicy;
use spoa_mirror::net::listener::Listener;
use spoa_mirror::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "spoa-mirror", version)]
#[command(about = "Mirror HAProxy traffic to a shadow host via SPOE", long_about = None)]
struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address where the agent listens for HAProxy
    #[arg(long)]
    listen: Option<String>,

    /// Base URL requests are mirrored to (no trailing slash)
    #[arg(long)]
    host: Option<String>,

    /// Number of parallel workers
    #[arg(long)]
    workers: Option<usize>,

    /// Size of the job queue
    #[arg(long)]
    queue_size: Option<usize>,

    /// Block when the queue is full instead of dropping
    #[arg(long)]
    queue_block: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Log every mirrored request
    #[arg(long)]
    verbose: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<String>,
}

impl Cli {
    fn resolve(self) -> Result<MirrorConfig, String> {
        let mut config = match &self.config {
            Some(path) => read_config(path).map_err(|e| format!("{}: {}", path.display(), e))?,
            None => MirrorConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(host) = self.host {
            config.mirror.host = host;
        }
        if let Some(workers) = self.workers {
            config.queue.workers = workers;
        }
        if let Some(size) = self.queue_size {
            config.queue.capacity = size;
        }
        if self.queue_block {
            config.queue.policy = AdmissionPolicy::Block;
        }
        config.observability.debug |= self.debug;
        config.observability.verbose |= self.verbose;
        if self.metrics_address.is_some() {
            config.observability.metrics_address = self.metrics_address;
        }

        validate_config(&config).map_err(|errors| {
            errors
                .iter()
                .map(|e| format!("Error: {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        })?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().resolve() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.observability.debug);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listener.bind_address,
        mirror_host = %config.mirror.host,
        workers = config.queue.workers,
        queue_size = config.queue.capacity,
        queue_block = config.queue.policy == AdmissionPolicy::Block,
        "spoa-mirror starting"
    );

    if let Some(addr) = &config.observability.metrics_address {
        // Address syntax was validated above.
        if let Ok(addr) = addr.parse() {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics endpoint");
                return ExitCode::FAILURE;
            }
        }
    }

    let listener = match Listener::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Error creating listener");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    if let Err(e) = MirrorServer::new(config).run(listener, signal).await {
        tracing::error!(error = %e, "Mirror agent failed to start");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
