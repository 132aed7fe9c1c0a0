//! Fixed-size worker pool draining the job queue.
//!
//! # Responsibilities
//! - Spawn `n` workers sharing one [`JobReceiver`]
//! - Hand every job to the dispatcher, one at a time per worker
//! - Drain: `stop` returns once every worker has seen the queue close
//!
//! # Design Decisions
//! - Worker count is fixed at start; no resizing
//! - A failed or panicking dispatch is logged and the worker carries on

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinHandle;

use crate::mirror::dispatcher::Dispatch;
use crate::mirror::queue::JobReceiver;

/// Running set of mirror workers.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` consumers on the current Tokio runtime.
    pub fn start<D: Dispatch>(workers: usize, receiver: JobReceiver, dispatcher: Arc<D>) -> Self {
        let handles = (1..=workers)
            .map(|id| tokio::spawn(run_worker(id, receiver.clone(), Arc::clone(&dispatcher))))
            .collect();

        tracing::info!(workers, "Worker pool started");
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to drain the queue and exit.
    ///
    /// The queue must be closed first, otherwise this waits forever.
    pub async fn stop(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Mirror worker terminated abnormally");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn run_worker<D: Dispatch>(id: usize, receiver: JobReceiver, dispatcher: Arc<D>) {
    tracing::debug!(worker = id, "Worker started");

    while let Some(job) = receiver.recv().await {
        let method = job.method().to_string();
        let path = job.path().to_string();

        match AssertUnwindSafe(dispatcher.dispatch(job)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(worker = id, method = %method, path = %path, error = %e, "Mirror dispatch failed");
            }
            Err(_) => {
                tracing::error!(worker = id, method = %method, path = %path, "Mirror dispatch panicked");
            }
        }
    }

    tracing::debug!(worker = id, "Worker stopped");
}
