//! chainsub-zmq: ZeroMQ `SUB` transport for ChainSub listeners.
//!
//! ```rust,no_run
//! use chainsub_core::{BlockListener, ListenerConfig, PopMode};
//! use chainsub_zmq::SubscribeContext;
//!
//! let ctx = SubscribeContext::new();
//! let blocks = BlockListener::connect(&ctx, &ListenerConfig::blocks()).unwrap();
//! if let Some((depth, block)) = blocks.pop(PopMode::Forever) {
//!     println!("{depth} {}", block.hash());
//! }
//! ```

pub mod context;
pub mod subscriber;

pub use context::SubscribeContext;
pub use subscriber::ZmqSubscriber;
