//! Error types for the subscribe → queue pipeline.

use thiserror::Error;

/// Which kind of frame was being decoded when a [`DecodeError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// The 4-byte depth prefix of a block pair.
    Depth,
    /// A raw block payload.
    Block,
    /// A raw transaction payload.
    Transaction,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Depth => write!(f, "depth"),
            Self::Block => write!(f, "block"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

/// A frame could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} decode failed ({raw_len} bytes): {reason}")]
pub struct DecodeError {
    pub kind: RecordKind,
    pub reason: String,
    /// Length of the offending frame.
    pub raw_len: usize,
}

impl DecodeError {
    pub fn new(kind: RecordKind, reason: impl Into<String>, raw_len: usize) -> Self {
        Self {
            kind,
            reason: reason.into(),
            raw_len,
        }
    }
}

/// Errors raised by a transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The socket could not be created, configured or connected.
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// A receive call failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The connection (or its context) has been torn down.
    #[error("connection closed")]
    Closed,
}

/// Errors surfaced by a listener, either from construction or as the reason
/// its receive loop terminated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    #[error("transport connect failed: {0}")]
    Connect(TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The transport failed while the loop was running. `discarded_depth`
    /// holds a depth whose payload frame never arrived.
    #[error("disconnected from {endpoint}: {reason}")]
    Disconnected {
        endpoint: String,
        discarded_depth: Option<u32>,
        reason: TransportError,
    },

    #[error("failed to spawn receive thread: {reason}")]
    Spawn { reason: String },

    #[error("receive thread panicked")]
    Panicked,
}

impl ListenerError {
    /// Returns `true` if the loop ended because of a malformed frame.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Returns `true` if the loop ended because the transport went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}
