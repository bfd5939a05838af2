//! Transport seams: what a listener needs from a publish/subscribe connection.
//!
//! A [`SubscriptionFactory`] (a shared context) opens connections; each
//! connection is a [`FrameSource`] owned by exactly one receive loop.

use std::time::Duration;

use bytes::Bytes;

use crate::config::Endpoint;
use crate::error::TransportError;

/// One subscribed connection delivering frames in publish order.
pub trait FrameSource: Send + 'static {
    /// Wait up to the poll interval for the next frame.
    ///
    /// `Ok(None)` means nothing arrived in time; the connection is still
    /// usable. `Err` means it is not.
    fn recv_frame(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// The address this source is connected to.
    fn endpoint(&self) -> &str;
}

/// Opens subscriptions. Implementations are cheap to share between listeners.
pub trait SubscriptionFactory {
    type Source: FrameSource;

    /// Connect to `endpoint` and subscribe to every topic.
    fn subscribe(
        &self,
        endpoint: &Endpoint,
        poll_interval: Duration,
    ) -> Result<Self::Source, TransportError>;
}
