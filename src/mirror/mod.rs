//! Mirror dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! SPOP `mirror` message
//!     → adapter.rs (argument extraction, body copy)
//!     → queue.rs (bounded FIFO, block or drop when full)
//!     → pool.rs (N workers)
//!     → dispatcher.rs (+ headers.rs) → mirror host
//! ```
//!
//! # Design Decisions
//! - Nothing here can fail the primary request: every error ends as a log
//!   event at the stage where it happened
//! - Fire and forget: no retries, no persistence, no ordering across workers

pub mod adapter;
pub mod dispatcher;
pub mod headers;
pub mod pool;
pub mod queue;
pub mod request;

pub use adapter::{MessageShapeError, MirrorAdapter};
pub use dispatcher::{Dispatch, DispatchError, HttpDispatcher};
pub use pool::WorkerPool;
pub use queue::{bounded, Admission, AdmissionPolicy, JobQueue, JobReceiver};
pub use request::MirrorRequest;
