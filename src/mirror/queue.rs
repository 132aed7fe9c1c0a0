//! Bounded job queue with block or drop admission.
//!
//! # Design Decisions
//! - Backed by a bounded `tokio::sync::mpsc` channel
//! - Consumers share one receiver behind an async mutex, so every job is
//!   delivered to exactly one worker in FIFO order
//! - Closing swaps the sender out; once the last in-flight submission
//!   finishes the channel closes and workers drain what is buffered

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::mirror::request::MirrorRequest;
use crate::observability::metrics;

/// Queue-full drops between two warn-level log events.
const DROP_WARN_EVERY: u64 = 1000;

/// What to do when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Wait for a free slot.
    Block,
    /// Discard the job immediately.
    #[default]
    Drop,
}

/// Outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Queue was full in drop mode.
    Dropped,
    /// Queue was closed, or every consumer is gone.
    Closed,
}

/// Producer side of the queue.
#[derive(Debug)]
pub struct JobQueue {
    sender: ArcSwapOption<mpsc::Sender<MirrorRequest>>,
    policy: AdmissionPolicy,
    capacity: usize,
    dropped: AtomicU64,
}

/// Consumer side, cloned into every worker.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    inner: Arc<Mutex<mpsc::Receiver<MirrorRequest>>>,
}

/// Create a queue holding at most `capacity` pending jobs.
///
/// `capacity` must be non-zero; config validation guarantees it.
pub fn bounded(capacity: usize, policy: AdmissionPolicy) -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let queue = JobQueue {
        sender: ArcSwapOption::from_pointee(tx),
        policy,
        capacity,
        dropped: AtomicU64::new(0),
    };
    let receiver = JobReceiver {
        inner: Arc::new(Mutex::new(rx)),
    };
    (queue, receiver)
}

impl JobQueue {
    /// Submit a job according to the admission policy.
    ///
    /// Only suspends in [`AdmissionPolicy::Block`] mode while the queue is full.
    pub async fn submit(&self, job: MirrorRequest) -> Admission {
        let Some(sender) = self.sender.load_full() else {
            tracing::debug!(method = %job.method(), path = %job.path(), "Queue closed, rejecting mirror job");
            return Admission::Closed;
        };

        let admission = match self.policy {
            AdmissionPolicy::Block => match sender.send(job).await {
                Ok(()) => Admission::Accepted,
                Err(_) => Admission::Closed,
            },
            AdmissionPolicy::Drop => match sender.try_send(job) {
                Ok(()) => Admission::Accepted,
                Err(mpsc::error::TrySendError::Full(job)) => {
                    self.record_drop(&job);
                    Admission::Dropped
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Admission::Closed,
            },
        };

        metrics::record_admission(admission);
        admission
    }

    fn record_drop(&self, job: &MirrorRequest) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            capacity = self.capacity,
            method = %job.method(),
            path = %job.path(),
            "Queue full, dropping mirror job"
        );
        if dropped == 1 || dropped % DROP_WARN_EVERY == 0 {
            tracing::warn!(
                capacity = self.capacity,
                dropped_total = dropped,
                "Mirror queue full, jobs are being dropped"
            );
        }
    }

    /// Stop accepting jobs. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let closed = self.sender.swap(None).is_some();
        if closed {
            tracing::info!(dropped_total = self.dropped_count(), "Mirror queue closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.sender.load().is_none()
    }

    /// Number of jobs discarded because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl JobReceiver {
    /// Take the next job, or `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<MirrorRequest> {
        self.inner.lock().await.recv().await
    }
}
