//! Translation of SPOP `mirror` messages into queued jobs.
//!
//! Expected SPOE configuration on the HAProxy side:
//!
//! ```text
//! spoe-message mirror
//!     args arg_method=method arg_path=url arg_hdrs=req.hdrs arg_body=req.body
//!     event on-frontend-http-request
//! ```

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::mirror::queue::{Admission, JobQueue};
use crate::mirror::request::MirrorRequest;
use crate::observability::metrics;
use crate::spop::{Message, MessageHandler, TypedData};

/// Name of the SPOE message carrying a request to mirror.
pub const MIRROR_MESSAGE: &str = "mirror";

pub const ARG_METHOD: &str = "arg_method";
pub const ARG_PATH: &str = "arg_path";
pub const ARG_HEADERS: &str = "arg_hdrs";
pub const ARG_BODY: &str = "arg_body";

/// Why a `mirror` message could not become a job.
///
/// These indicate an SPOE configuration mismatch, not a transient failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageShapeError {
    #[error("{0} not found in message")]
    MissingArgument(&'static str),

    #[error("headers arrived in binary form; use arg_hdrs=req.hdrs instead of req.hdrs_bin")]
    BinaryHeaders,

    #[error("{arg} must be {expected}, got {found}")]
    UnexpectedType {
        arg: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Entry point for decoded SPOP messages.
#[derive(Debug)]
pub struct MirrorAdapter {
    queue: Arc<JobQueue>,
    verbose: bool,
}

impl MirrorAdapter {
    pub fn new(queue: Arc<JobQueue>, verbose: bool) -> Self {
        Self { queue, verbose }
    }

    /// Handle one message: ignore, diagnose or enqueue. Never fails.
    pub async fn handle(&self, message: &Message) -> Option<Admission> {
        if message.name != MIRROR_MESSAGE {
            return None;
        }

        let job = match extract(message) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed mirror message");
                metrics::record_invalid_message();
                return None;
            }
        };

        if self.verbose {
            tracing::info!(
                method = %job.method(),
                path = %job.path(),
                body_len = job.body().len(),
                "Mirror request received"
            );
        }

        Some(self.queue.submit(job).await)
    }
}

impl MessageHandler for MirrorAdapter {
    async fn on_message(&self, message: &Message) {
        self.handle(message).await;
    }
}

/// Build a job from a `mirror` message, copying the body out of the frame.
pub fn extract(message: &Message) -> Result<MirrorRequest, MessageShapeError> {
    let method = string_arg(message, ARG_METHOD)?;
    let path = string_arg(message, ARG_PATH)?;

    let headers = match required(message, ARG_HEADERS)? {
        TypedData::String(s) => s.as_str(),
        TypedData::Binary(_) => return Err(MessageShapeError::BinaryHeaders),
        other => return Err(unexpected(ARG_HEADERS, "string", other)),
    };

    let body: &[u8] = match required(message, ARG_BODY)? {
        TypedData::Binary(b) => &b[..],
        // HAProxy sends NULL when no body was buffered.
        TypedData::Null => &[][..],
        other => return Err(unexpected(ARG_BODY, "binary", other)),
    };

    Ok(MirrorRequest::new(method, path, headers, Bytes::copy_from_slice(body)))
}

fn required<'a>(message: &'a Message, arg: &'static str) -> Result<&'a TypedData, MessageShapeError> {
    message.arg(arg).ok_or(MessageShapeError::MissingArgument(arg))
}

fn string_arg<'a>(message: &'a Message, arg: &'static str) -> Result<&'a str, MessageShapeError> {
    match required(message, arg)? {
        TypedData::String(s) => Ok(s.as_str()),
        other => Err(unexpected(arg, "string", other)),
    }
}

fn unexpected(arg: &'static str, expected: &'static str, found: &TypedData) -> MessageShapeError {
    MessageShapeError::UnexpectedType {
        arg,
        expected,
        found: found.kind(),
    }
}
