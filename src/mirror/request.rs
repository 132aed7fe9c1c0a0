//! The unit of work carried from the adapter to the workers.

use bytes::Bytes;

/// One request to replay against the mirror host.
///
/// Built once per `mirror` message and never mutated. The body is an owned
/// copy, so the value holds no reference into protocol-layer buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    method: String,
    path: String,
    header_block: String,
    body: Bytes,
}

impl MirrorRequest {
    /// Create a request from already-extracted parts.
    ///
    /// `body` is taken as-is; callers holding borrowed bytes must copy them
    /// first (see [`MirrorRequest::copying_body`]).
    pub fn new(method: impl Into<String>, path: impl Into<String>, header_block: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            header_block: header_block.into(),
            body,
        }
    }

    /// Create a request with a fresh allocation holding a copy of `body`.
    pub fn copying_body(method: impl Into<String>, path: impl Into<String>, header_block: impl Into<String>, body: &[u8]) -> Self {
        Self::new(method, path, header_block, Bytes::copy_from_slice(body))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw `Key: Value` lines as delivered by HAProxy's `req.hdrs`.
    pub fn header_block(&self) -> &str {
        &self.header_block
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
