//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Dispatcher → Queue → Worker pool → Adapter → SPOP agent serving
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Disconnect SPOP connections
//!     → Close queue → Drain workers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Workers are running before the first connection is accepted
//! - In-flight mirrored calls are never interrupted; the drain waits

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{MirrorServer, StartupError};
