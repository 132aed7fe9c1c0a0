//! HAProxy SPOE traffic mirroring agent.
//!
//! Receives `mirror` messages over SPOP and replays each request against a
//! shadow host through a bounded queue and a fixed worker pool, without
//! ever holding up the proxied request.

pub mod config;
pub mod lifecycle;
pub mod mirror;
pub mod net;
pub mod observability;
pub mod spop;

pub use config::MirrorConfig;
pub use lifecycle::{MirrorServer, Shutdown};
