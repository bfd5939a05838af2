//! chainsub-core: the subscriber-to-queue bridge.
//!
//! A [`Listener`] owns one subscription and a background thread that turns
//! incoming frames into decoded records and pushes them onto an
//! [`ItemQueue`]. Consumers drain the queue at their own pace with one of
//! three [`PopMode`]s.
//!
//! # Architecture
//!
//! ```text
//! SubscriptionFactory ──subscribe()──▶ FrameSource
//!                                          │ recv_frame()
//!                                          ▼
//!                               Framing (BlockFraming / TransactionFraming)
//!                                          │ RecordDecoder
//!                                          ▼
//!                                      ItemQueue ──pop(PopMode)──▶ consumers
//! ```
//!
//! The transport itself lives in a separate crate (`chainsub-zmq`).

pub mod config;
pub mod decoder;
pub mod error;
pub mod framing;
pub mod listener;
pub mod queue;
pub mod record;
pub mod transport;

pub use config::{DecodeErrorPolicy, Endpoint, ListenerBuilder, ListenerConfig, StreamKind};
pub use decoder::{BitcoinDecoder, RecordDecoder};
pub use error::{DecodeError, ListenerError, RecordKind, TransportError};
pub use framing::{BlockFraming, FramePhase, Framing, TransactionFraming};
pub use listener::{BlockListener, Listener, ListenerState, ListenerStatus, TransactionListener};
pub use queue::{ItemQueue, PopMode};
pub use record::{Block, Hash256, Transaction};
pub use transport::{FrameSource, SubscriptionFactory};
