//! Outbound HTTP replay of mirror jobs.
//!
//! # Responsibilities
//! - Own the shared, pooled HTTP client
//! - Build one request per job against `mirror_host + path`
//! - Drain every response body so pooled connections are released
//!
//! # Design Decisions
//! - No retries, no backoff: mirror traffic is best effort
//! - Every call is bounded by the connect and total request timeouts
//! - Verbose logging is a plain boolean check when disabled

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use thiserror::Error;

use crate::config::MirrorTargetConfig;
use crate::mirror::headers::{is_framing_header, parse_header_block};
use crate::mirror::request::MirrorRequest;
use crate::observability::metrics;

/// Failure of a single mirrored call.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("invalid mirror URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("mirror request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Something that can replay a mirror job.
///
/// Implemented by [`HttpDispatcher`]; tests substitute recording doubles.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, request: MirrorRequest) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Replays jobs over a shared connection-pooled client.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    mirror_host: String,
    verbose: bool,
}

impl HttpDispatcher {
    /// Build the dispatcher and its connection pool.
    pub fn new(config: &MirrorTargetConfig, verbose: bool) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()
            .map_err(DispatchError::Client)?;

        tracing::info!(
            mirror_host = %config.host,
            connect_timeout_ms = config.connect_timeout_ms,
            request_timeout_ms = config.request_timeout_ms,
            max_idle_per_host = config.max_idle_per_host,
            "HTTP dispatcher ready"
        );

        Ok(Self {
            client,
            mirror_host: config.host.clone(),
            verbose,
        })
    }

    fn build(&self, request: &MirrorRequest) -> Result<reqwest::Request, DispatchError> {
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|_| DispatchError::InvalidMethod(request.method().to_string()))?;

        let raw_url = format!("{}{}", self.mirror_host, request.path());
        let url = Url::parse(&raw_url).map_err(|source| DispatchError::InvalidUrl { url: raw_url, source })?;

        let mut outbound = reqwest::Request::new(method, url);
        *outbound.headers_mut() = build_headers(request.header_block());
        *outbound.body_mut() = Some(request.body().clone().into());
        Ok(outbound)
    }

    async fn send(&self, outbound: reqwest::Request) -> Result<StatusCode, DispatchError> {
        let mut response = self.client.execute(outbound).await.map_err(DispatchError::Transport)?;
        let status = response.status();

        // Discard the body chunk by chunk so the connection goes back to the pool.
        loop {
            match response.chunk().await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(status = %status, error = %e, "Mirror response body not fully read");
                    break;
                }
            }
        }
        Ok(status)
    }
}

impl Dispatch for HttpDispatcher {
    async fn dispatch(&self, request: MirrorRequest) -> Result<(), DispatchError> {
        let outbound = self.build(&request)?;
        let url = outbound.url().clone();
        let start = Instant::now();

        let result = self.send(outbound).await;
        metrics::record_dispatch(result.is_ok(), start);

        match &result {
            Ok(status) if self.verbose => {
                tracing::info!(method = %request.method(), url = %url, status = status.as_u16(), "Mirrored request");
            }
            Err(e) if self.verbose => {
                tracing::info!(method = %request.method(), url = %url, error = %e, "Mirrored request failed");
            }
            _ => {}
        }

        result.map(|_| ())
    }
}

/// Convert the raw header block into a header map.
///
/// Later duplicates replace earlier ones. Names or values the HTTP stack
/// rejects are skipped like malformed lines.
fn build_headers(block: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in parse_header_block(block) {
        if is_framing_header(name) {
            continue;
        }
        let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
            tracing::debug!(name = %name, "Skipping header rejected by the HTTP stack");
            continue;
        };
        headers.insert(name, value);
    }

    headers
}
