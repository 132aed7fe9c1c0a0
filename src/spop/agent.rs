//! SPOP agent accept loop.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ListenerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::spop::connection::Connection;
use crate::spop::MessageHandler;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Serves SPOP connections and feeds decoded messages to a handler.
pub struct Agent<H> {
    handler: Arc<H>,
    max_frame_size: u32,
    drain_timeout: Duration,
    tracker: ConnectionTracker,
}

impl<H: MessageHandler> Agent<H> {
    pub fn new(handler: Arc<H>, config: &ListenerConfig) -> Self {
        Self {
            handler,
            max_frame_size: config.max_frame_size,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept connections until shutdown, then wait for open ones to close.
    ///
    /// Open connections see the same signal, finish their current frame and
    /// disconnect; the wait is bounded by the configured drain timeout.
    pub async fn serve(&self, listener: Listener, mut shutdown: ShutdownSignal) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, max_frame_size = self.max_frame_size, "SPOP agent serving");
        }

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.recv() => break,
            };

            let (stream, peer, permit) = match accepted {
                Ok(conn) => conn,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(peer_addr = %peer, error = %e, "Failed to set TCP_NODELAY");
            }

            let guard = self.tracker.track();
            let connection = Connection::new(stream, peer, guard.id(), Arc::clone(&self.handler), self.max_frame_size);
            let signal = shutdown.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                connection.run(signal).await;
            });
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "SPOP agent stopped accepting connections"
        );

        if tokio::time::timeout(self.drain_timeout, self.tracker.wait_for_idle()).await.is_err() {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Drain timeout elapsed with SPOP connections still open"
            );
        }
    }
}
