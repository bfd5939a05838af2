//! Shared ZeroMQ context handed to every listener.

use std::time::Duration;

use chainsub_core::{Endpoint, SubscriptionFactory, TransportError};

use crate::subscriber::ZmqSubscriber;

/// A ZeroMQ context. Clones share the same I/O threads, so one context can
/// back any number of listeners.
#[derive(Clone)]
pub struct SubscribeContext {
    inner: zmq::Context,
}

impl Default for SubscribeContext {
    fn default() -> Self {
        Self {
            inner: zmq::Context::new(),
        }
    }
}

impl SubscribeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing context, e.g. one the application already uses for
    /// other sockets.
    pub fn from_zmq(inner: zmq::Context) -> Self {
        Self { inner }
    }

    pub fn as_zmq(&self) -> &zmq::Context {
        &self.inner
    }
}

impl std::fmt::Debug for SubscribeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscribeContext").finish_non_exhaustive()
    }
}

impl SubscriptionFactory for SubscribeContext {
    type Source = ZmqSubscriber;

    fn subscribe(&self, endpoint: &Endpoint, poll_interval: Duration) -> Result<ZmqSubscriber, TransportError> {
        ZmqSubscriber::connect(&self.inner, endpoint, poll_interval)
    }
}
