//! One SPOP connection from HELLO to DISCONNECT.
//!
//! # Connection States
//! ```text
//! Handshake → Serving → Closed
//!     │           │
//!     │           └─ NOTIFY → on_message × N → ACK
//!     └─ healthcheck HELLO → AGENT-HELLO → Closed
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionId;
use crate::spop::frame::{read_frame, write_frame, Frame, FrameType};
use crate::spop::{DisconnectStatus, FrameError, MessageHandler, TypedData, SPOP_VERSION};

/// Capability advertised back when HAProxy offers it.
const PIPELINING: &str = "pipelining";

/// Result of the HELLO exchange.
#[derive(Debug, PartialEq, Eq)]
enum Handshake {
    Ready,
    HealthCheck,
    Rejected(DisconnectStatus),
    Closed,
}

/// Agent side of a single SPOP connection.
pub struct Connection<S, H> {
    stream: S,
    peer: SocketAddr,
    id: ConnectionId,
    handler: Arc<H>,
    max_frame_size: u32,
    buf: BytesMut,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: MessageHandler,
{
    pub fn new(stream: S, peer: SocketAddr, id: ConnectionId, handler: Arc<H>, max_frame_size: u32) -> Self {
        Self {
            stream,
            peer,
            id,
            handler,
            max_frame_size,
            buf: BytesMut::with_capacity(max_frame_size as usize),
        }
    }

    /// Drive the connection until HAProxy disconnects, an error occurs or
    /// shutdown is signalled.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::debug!(connection_id = %self.id, peer_addr = %self.peer, "SPOP connection opened");

        if let Err(e) = self.serve(&mut shutdown).await {
            match &e {
                FrameError::Io(_) => {
                    tracing::debug!(connection_id = %self.id, error = %e, "SPOP connection I/O error");
                }
                _ => {
                    tracing::warn!(connection_id = %self.id, peer_addr = %self.peer, error = %e, "Closing SPOP connection");
                    let status = e.status();
                    self.disconnect(status, status.message()).await;
                }
            }
        }

        tracing::debug!(connection_id = %self.id, "SPOP connection closed");
    }

    async fn serve(&mut self, shutdown: &mut ShutdownSignal) -> Result<(), FrameError> {
        match self.handshake().await? {
            Handshake::Ready => {}
            Handshake::HealthCheck | Handshake::Closed => return Ok(()),
            Handshake::Rejected(status) => {
                tracing::warn!(connection_id = %self.id, status = status.code(), "Rejecting SPOP handshake");
                self.disconnect(status, status.message()).await;
                return Ok(());
            }
        }

        loop {
            let frame = tokio::select! {
                frame = read_frame(&mut self.stream, &mut self.buf, self.max_frame_size) => frame?,
                _ = shutdown.recv() => {
                    self.disconnect(DisconnectStatus::Normal, "agent shutting down").await;
                    return Ok(());
                }
            };
            let Some(frame) = frame else {
                return Ok(());
            };

            match frame.frame_type {
                FrameType::Notify => {
                    if !frame.is_fin() {
                        let status = DisconnectStatus::FragmentationNotSupported;
                        self.disconnect(status, status.message()).await;
                        return Ok(());
                    }
                    self.notify(&frame).await?;
                }
                FrameType::HaproxyDisconnect => {
                    self.log_disconnect(&frame);
                    self.disconnect(DisconnectStatus::Normal, "normal").await;
                    return Ok(());
                }
                other => {
                    tracing::warn!(connection_id = %self.id, frame_type = ?other, "Unexpected SPOP frame");
                    let status = DisconnectStatus::Invalid;
                    self.disconnect(status, status.message()).await;
                    return Ok(());
                }
            }
        }
    }

    async fn handshake(&mut self) -> Result<Handshake, FrameError> {
        let Some(frame) = read_frame(&mut self.stream, &mut self.buf, self.max_frame_size).await? else {
            return Ok(Handshake::Closed);
        };
        if frame.frame_type != FrameType::HaproxyHello {
            return Ok(Handshake::Rejected(DisconnectStatus::Invalid));
        }

        let kv = frame.kv_list()?;
        let lookup = |name: &str| kv.iter().find(|(n, _)| n == name).map(|(_, v)| v);

        let Some(versions) = lookup("supported-versions").and_then(TypedData::as_str) else {
            return Ok(Handshake::Rejected(DisconnectStatus::NoVersion));
        };
        if !versions.split(',').any(|v| v.trim() == SPOP_VERSION) {
            return Ok(Handshake::Rejected(DisconnectStatus::BadVersion));
        }

        let Some(haproxy_frame_size) = lookup("max-frame-size").and_then(TypedData::as_u64) else {
            return Ok(Handshake::Rejected(DisconnectStatus::NoFrameSize));
        };
        self.max_frame_size = self.max_frame_size.min(u32::try_from(haproxy_frame_size).unwrap_or(u32::MAX));

        let pipelining = lookup("capabilities")
            .and_then(TypedData::as_str)
            .is_some_and(|caps| caps.split(',').any(|c| c.trim() == PIPELINING));
        let healthcheck = lookup("healthcheck").and_then(TypedData::as_bool).unwrap_or(false);

        let capabilities = if pipelining { PIPELINING } else { "" };
        write_frame(&mut self.stream, &Frame::agent_hello(self.max_frame_size, capabilities)).await?;

        tracing::debug!(
            connection_id = %self.id,
            max_frame_size = self.max_frame_size,
            pipelining,
            healthcheck,
            engine_id = lookup("engine-id").and_then(TypedData::as_str).unwrap_or("-"),
            "SPOP handshake complete"
        );

        Ok(if healthcheck { Handshake::HealthCheck } else { Handshake::Ready })
    }

    async fn notify(&mut self, frame: &Frame) -> Result<(), FrameError> {
        let messages = frame.messages()?;
        tracing::trace!(
            connection_id = %self.id,
            stream_id = frame.stream_id,
            frame_id = frame.frame_id,
            messages = messages.len(),
            "NOTIFY received"
        );

        for message in &messages {
            self.handler.on_message(message).await;
        }

        write_frame(&mut self.stream, &Frame::ack(frame.stream_id, frame.frame_id)).await
    }

    fn log_disconnect(&self, frame: &Frame) {
        let kv = frame.kv_list().unwrap_or_default();
        let status = kv
            .iter()
            .find(|(n, _)| n == "status-code")
            .and_then(|(_, v)| v.as_u64())
            .map(DisconnectStatus::from_code)
            .unwrap_or(DisconnectStatus::Unknown);
        let message = kv
            .iter()
            .find(|(n, _)| n == "message")
            .and_then(|(_, v)| v.as_str())
            .unwrap_or("");

        tracing::debug!(connection_id = %self.id, status = ?status, message = %message, "HAProxy disconnected");
    }

    /// Best effort: the peer may already be gone.
    async fn disconnect(&mut self, status: DisconnectStatus, message: &str) {
        if let Err(e) = write_frame(&mut self.stream, &Frame::agent_disconnect(status, message)).await {
            tracing::trace!(connection_id = %self.id, error = %e, "Failed to send AGENT-DISCONNECT");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::spop::Message;
    use std::sync::Mutex;
    use tokio::io::{duplex, DuplexStream};

    #[derive(Default)]
    struct Collect(Mutex<Vec<Message>>);

    impl MessageHandler for Collect {
        async fn on_message(&self, message: &Message) {
            self.0.lock().unwrap().push(message.clone());
        }
    }

    async fn send(stream: &mut DuplexStream, frame: Frame) {
        write_frame(stream, &frame).await.unwrap();
    }

    async fn recv(stream: &mut DuplexStream) -> Frame {
        let mut buf = BytesMut::new();
        read_frame(stream, &mut buf, u32::MAX).await.unwrap().unwrap()
    }

    fn spawn_connection(handler: Arc<Collect>, shutdown: &Shutdown) -> (DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = duplex(64 * 1024);
        let conn = Connection::new(server, "127.0.0.1:1".parse().unwrap(), ConnectionId::new(), handler, 16384);
        let task = tokio::spawn(conn.run(shutdown.subscribe()));
        (client, task)
    }

    #[tokio::test]
    async fn hello_notify_disconnect() {
        let handler = Arc::new(Collect::default());
        let shutdown = Shutdown::new();
        let (mut client, task) = spawn_connection(handler.clone(), &shutdown);

        send(&mut client, Frame::haproxy_hello(16380, "pipelining,async", false)).await;
        let hello = recv(&mut client).await;
        assert_eq!(hello.frame_type, FrameType::AgentHello);
        let kv = hello.kv_list().unwrap();
        assert!(kv.contains(&("max-frame-size".to_string(), TypedData::Uint32(16380))));
        assert!(kv.contains(&("capabilities".to_string(), TypedData::String("pipelining".into()))));

        let message = Message::new("mirror").with_arg("arg_method", TypedData::String("GET".into()));
        send(&mut client, Frame::notify(7, 9, &[message.clone()])).await;
        let ack = recv(&mut client).await;
        assert_eq!(ack.frame_type, FrameType::Ack);
        assert_eq!((ack.stream_id, ack.frame_id), (7, 9));
        assert_eq!(*handler.0.lock().unwrap(), vec![message]);

        send(&mut client, Frame::haproxy_disconnect(DisconnectStatus::Normal, "bye")).await;
        assert_eq!(recv(&mut client).await.frame_type, FrameType::AgentDisconnect);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn healthcheck_closes_after_hello() {
        let shutdown = Shutdown::new();
        let (mut client, task) = spawn_connection(Arc::new(Collect::default()), &shutdown);

        send(&mut client, Frame::haproxy_hello(16384, "", true)).await;
        assert_eq!(recv(&mut client).await.frame_type, FrameType::AgentHello);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let shutdown = Shutdown::new();
        let (mut client, task) = spawn_connection(Arc::new(Collect::default()), &shutdown);

        let mut hello = Frame::haproxy_hello(16384, "", false);
        let mut payload = BytesMut::new();
        crate::spop::data::encode_kv("supported-versions", &TypedData::String("1.0".into()), &mut payload);
        hello.payload = payload.freeze();
        send(&mut client, hello).await;

        let reply = recv(&mut client).await;
        assert_eq!(reply.frame_type, FrameType::AgentDisconnect);
        assert!(reply
            .kv_list()
            .unwrap()
            .contains(&("status-code".to_string(), TypedData::Uint32(DisconnectStatus::BadVersion.code()))));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn fragmented_notify_is_refused() {
        let shutdown = Shutdown::new();
        let handler = Arc::new(Collect::default());
        let (mut client, task) = spawn_connection(handler.clone(), &shutdown);

        send(&mut client, Frame::haproxy_hello(16384, "", false)).await;
        recv(&mut client).await;

        let mut notify = Frame::notify(1, 1, &[Message::new("mirror")]);
        notify.flags = 0;
        send(&mut client, notify).await;

        assert_eq!(recv(&mut client).await.frame_type, FrameType::AgentDisconnect);
        assert!(handler.0.lock().unwrap().is_empty());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_sends_disconnect() {
        let shutdown = Shutdown::new();
        let (mut client, task) = spawn_connection(Arc::new(Collect::default()), &shutdown);

        send(&mut client, Frame::haproxy_hello(16384, "", false)).await;
        recv(&mut client).await;

        shutdown.trigger();
        assert_eq!(recv(&mut client).await.frame_type, FrameType::AgentDisconnect);
        task.await.unwrap();
    }
}
