//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection from HAProxy
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (ID, open connection tracking)
//!     → Hand off to the SPOP agent
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;
