//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::Router;
use bytes::{Bytes, BytesMut};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use spoa_mirror::config::MirrorConfig;
use spoa_mirror::lifecycle::{MirrorServer, Shutdown};
use spoa_mirror::mirror::Dispatch;
use spoa_mirror::net::listener::Listener;
use spoa_mirror::spop::frame::{read_frame, write_frame};
use spoa_mirror::spop::{Frame, FrameType, Message, TypedData};

/// A request as seen by the mock shadow backend.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Captured {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Start a shadow backend that records every request it receives.
#[allow(dead_code)]
pub async fn start_shadow_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let app = Router::new().fallback(move |request: Request| {
        let tx = tx.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            let _ = tx.send(Captured {
                method: parts.method.to_string(),
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body,
            });
            "mirrored"
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, rx)
}

/// Config with an ephemeral listener and the given mirror host.
pub fn test_config(mirror_host: &str) -> MirrorConfig {
    let mut config = MirrorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.drain_timeout_secs = 2;
    config.mirror.host = mirror_host.to_string();
    config.queue.workers = 2;
    config.queue.capacity = 64;
    config
}

/// A running agent plus the means to stop it.
pub struct RunningAgent {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

impl RunningAgent {
    /// Trigger shutdown and wait for the worker pool to drain.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("agent did not drain in time")
            .unwrap();
    }
}

/// Start the agent with the real HTTP dispatcher.
#[allow(dead_code)]
pub async fn start_agent(config: MirrorConfig) -> RunningAgent {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    let task = tokio::spawn(async move {
        MirrorServer::new(config).run(listener, signal).await.unwrap();
    });

    RunningAgent { addr, shutdown, task }
}

/// Start the agent with a substitute dispatcher.
#[allow(dead_code)]
pub async fn start_agent_with<D: Dispatch>(config: MirrorConfig, dispatcher: Arc<D>) -> RunningAgent {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    let task = tokio::spawn(async move {
        MirrorServer::new(config).run_with(dispatcher, listener, signal).await;
    });

    RunningAgent { addr, shutdown, task }
}

/// Minimal HAProxy side of an SPOP connection.
pub struct SpopClient {
    stream: TcpStream,
    buf: BytesMut,
    next_frame_id: u64,
}

impl SpopClient {
    /// Connect and complete the HELLO exchange.
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            buf: BytesMut::new(),
            next_frame_id: 1,
        };
        client.send(Frame::haproxy_hello(16_384, "pipelining", false)).await;
        let hello = client.recv().await;
        assert_eq!(hello.frame_type, FrameType::AgentHello);
        client
    }

    async fn send(&mut self, frame: Frame) {
        write_frame(&mut self.stream, &frame).await.unwrap();
    }

    async fn recv(&mut self) -> Frame {
        tokio::time::timeout(Duration::from_secs(5), read_frame(&mut self.stream, &mut self.buf, u32::MAX))
            .await
            .expect("no reply from agent")
            .unwrap()
            .expect("agent closed the connection")
    }

    /// Send one NOTIFY and wait for its ACK.
    pub async fn notify(&mut self, messages: &[Message]) {
        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;

        self.send(Frame::notify(1, frame_id, messages)).await;
        let ack = self.recv().await;
        assert_eq!(ack.frame_type, FrameType::Ack);
        assert_eq!(ack.frame_id, frame_id);
    }
}

/// A well-formed `mirror` message.
pub fn mirror_message(method: &str, path: &str, headers: &str, body: &[u8]) -> Message {
    Message::new("mirror")
        .with_arg("arg_method", TypedData::String(method.into()))
        .with_arg("arg_path", TypedData::String(path.into()))
        .with_arg("arg_hdrs", TypedData::String(headers.into()))
        .with_arg("arg_body", TypedData::Binary(Bytes::copy_from_slice(body)))
}
