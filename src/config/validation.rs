//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the mirror host URL and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: `&MirrorConfig → Result<(), Vec<ValidationError>>`

use std::net::SocketAddr;

use url::Url;

use crate::config::MirrorConfig;

/// Smallest frame size that still fits a HELLO exchange.
const MIN_FRAME_SIZE: u32 = 256;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &MirrorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_mirror_host(&config.mirror.host, &mut errors);

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a valid host:port address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be at least 1"));
    }
    if config.listener.max_frame_size < MIN_FRAME_SIZE {
        errors.push(ValidationError::new(
            "listener.max_frame_size",
            format!("must be at least {MIN_FRAME_SIZE}"),
        ));
    }

    if config.queue.workers == 0 {
        errors.push(ValidationError::new("queue.workers", "must be at least 1"));
    }
    if config.queue.capacity == 0 {
        errors.push(ValidationError::new("queue.capacity", "must be at least 1"));
    }

    if config.mirror.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("mirror.connect_timeout_ms", "must be greater than 0"));
    }
    if config.mirror.request_timeout_ms == 0 {
        errors.push(ValidationError::new("mirror.request_timeout_ms", "must be greater than 0"));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("{addr:?} is not a valid host:port address"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_mirror_host(host: &str, errors: &mut Vec<ValidationError>) {
    if host.is_empty() {
        errors.push(ValidationError::new("mirror.host", "hostname is required"));
        return;
    }
    if host.ends_with('/') {
        errors.push(ValidationError::new("mirror.host", "must not end with a trailing slash"));
        return;
    }
    match Url::parse(host) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        Ok(_) => errors.push(ValidationError::new("mirror.host", "must be an http:// or https:// URL")),
        Err(e) => errors.push(ValidationError::new("mirror.host", format!("invalid URL: {e}"))),
    }
}
