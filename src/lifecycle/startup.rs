//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Serve SPOP until shutdown
//! - Close the queue and drain the worker pool afterwards
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The worker pool runs before the agent accepts its first connection

use std::sync::Arc;

use thiserror::Error;

use crate::config::MirrorConfig;
use crate::lifecycle::ShutdownSignal;
use crate::mirror::{bounded, Dispatch, DispatchError, HttpDispatcher, MirrorAdapter, WorkerPool};
use crate::net::listener::Listener;
use crate::spop::Agent;

/// Fatal error before serving starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create HTTP dispatcher: {0}")]
    Dispatcher(#[from] DispatchError),
}

/// The assembled relay: SPOP agent in front, worker pool behind.
pub struct MirrorServer {
    config: MirrorConfig,
}

impl MirrorServer {
    /// Create a server from a validated configuration.
    pub fn new(config: MirrorConfig) -> Self {
        Self { config }
    }

    /// Run with the HTTP dispatcher built from the configuration.
    pub async fn run(self, listener: Listener, shutdown: ShutdownSignal) -> Result<(), StartupError> {
        let dispatcher = HttpDispatcher::new(&self.config.mirror, self.config.observability.verbose)?;
        self.run_with(Arc::new(dispatcher), listener, shutdown).await;
        Ok(())
    }

    /// Run with any dispatcher until `shutdown` fires and the pool drains.
    pub async fn run_with<D: Dispatch>(self, dispatcher: Arc<D>, listener: Listener, shutdown: ShutdownSignal) {
        let queue_config = &self.config.queue;
        tracing::info!(
            workers = queue_config.workers,
            capacity = queue_config.capacity,
            policy = ?queue_config.policy,
            "Starting mirror pipeline"
        );

        let (queue, receiver) = bounded(queue_config.capacity, queue_config.policy);
        let queue = Arc::new(queue);
        let pool = WorkerPool::start(queue_config.workers, receiver, dispatcher);

        let adapter = Arc::new(MirrorAdapter::new(Arc::clone(&queue), self.config.observability.verbose));
        let agent = Agent::new(adapter, &self.config.listener);

        agent.serve(listener, shutdown).await;
        tracing::info!("SPOP agent terminated, draining mirror queue");

        queue.close();
        pool.stop().await;
    }
}
