//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `debug` raises the crate's level to debug; RUST_LOG always wins

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for the given debug flag.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "spoa_mirror=debug"
    } else {
        "spoa_mirror=info"
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(debug: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(debug).into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
