//! HAProxy Stream Processing Offload Protocol (agent side).
//!
//! # Data Flow
//! ```text
//! HAProxy SPOE filter
//!     → agent.rs (accept loop, connection tracking)
//!     → connection.rs (HELLO handshake, NOTIFY → ACK, DISCONNECT)
//!     → frame.rs / data.rs / varint.rs (wire format)
//!     → MessageHandler::on_message (one call per decoded message)
//! ```
//!
//! # Design Decisions
//! - Only SPOP 2.0 is spoken; fragmentation and async capabilities are not
//!   advertised, so every NOTIFY is answered in order on its own connection
//! - ACKs carry no actions: the agent never sets variables in HAProxy
//! - Handler errors never reach the wire; only malformed frames close a
//!   connection

use std::future::Future;

use thiserror::Error;

pub mod agent;
pub mod connection;
pub mod data;
pub mod frame;
pub mod varint;

pub use agent::Agent;
pub use data::{Message, TypedData};
pub use frame::{Frame, FrameType};

/// Protocol version this agent speaks.
pub const SPOP_VERSION: &str = "2.0";

/// Receives every message decoded from NOTIFY frames.
///
/// May be called concurrently from independent connections. Must absorb
/// its own errors and return promptly.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, message: &Message) -> impl Future<Output = ()> + Send;
}

/// Wire-level failure on an SPOP connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame truncated")]
    Truncated,

    #[error("varint longer than 10 bytes")]
    VarintOverflow,

    #[error("unknown data type {0}")]
    UnknownDataType(u8),

    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    #[error("name is not valid UTF-8")]
    InvalidUtf8,

    #[error("frame of {size} bytes exceeds max-frame-size {max}")]
    TooBig { size: u32, max: u32 },
}

impl FrameError {
    /// Status reported to HAProxy when this error ends a connection.
    pub fn status(&self) -> DisconnectStatus {
        match self {
            FrameError::Io(_) => DisconnectStatus::Io,
            FrameError::TooBig { .. } => DisconnectStatus::TooBig,
            _ => DisconnectStatus::Invalid,
        }
    }
}

/// AGENT-DISCONNECT status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectStatus {
    Normal,
    Io,
    TooBig,
    Invalid,
    NoVersion,
    NoFrameSize,
    BadVersion,
    FragmentationNotSupported,
    Unknown,
}

impl DisconnectStatus {
    pub fn code(self) -> u32 {
        match self {
            DisconnectStatus::Normal => 0,
            DisconnectStatus::Io => 1,
            DisconnectStatus::TooBig => 3,
            DisconnectStatus::Invalid => 4,
            DisconnectStatus::NoVersion => 5,
            DisconnectStatus::NoFrameSize => 6,
            DisconnectStatus::BadVersion => 8,
            DisconnectStatus::FragmentationNotSupported => 10,
            DisconnectStatus::Unknown => 99,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            0 => DisconnectStatus::Normal,
            1 => DisconnectStatus::Io,
            3 => DisconnectStatus::TooBig,
            4 => DisconnectStatus::Invalid,
            5 => DisconnectStatus::NoVersion,
            6 => DisconnectStatus::NoFrameSize,
            8 => DisconnectStatus::BadVersion,
            10 => DisconnectStatus::FragmentationNotSupported,
            _ => DisconnectStatus::Unknown,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            DisconnectStatus::Normal => "normal",
            DisconnectStatus::Io => "I/O error",
            DisconnectStatus::TooBig => "frame is too big",
            DisconnectStatus::Invalid => "invalid frame received",
            DisconnectStatus::NoVersion => "version value not found",
            DisconnectStatus::NoFrameSize => "max-frame-size value not found",
            DisconnectStatus::BadVersion => "unsupported version",
            DisconnectStatus::FragmentationNotSupported => "fragmentation not supported",
            DisconnectStatus::Unknown => "an unknown error occurred",
        }
    }
}
