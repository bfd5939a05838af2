//! A single `SUB` socket exposed as a [`FrameSource`].

use std::time::Duration;

use bytes::Bytes;
use chainsub_core::{Endpoint, FrameSource, TransportError};

/// A connected, subscribe-all `SUB` socket.
///
/// Each `recv_frame` returns one message part, so a multipart publish is
/// read as consecutive frames.
pub struct ZmqSubscriber {
    socket: zmq::Socket,
    endpoint: String,
}

impl ZmqSubscriber {
    /// Create the socket, connect it to `endpoint` and subscribe to every
    /// topic. Receives give up after `poll_interval` with no message.
    pub fn connect(
        ctx: &zmq::Context,
        endpoint: &Endpoint,
        poll_interval: Duration,
    ) -> Result<Self, TransportError> {
        let url = endpoint.to_string();
        let connect_err = |e: zmq::Error| TransportError::Connect {
            endpoint: url.clone(),
            reason: e.to_string(),
        };

        let socket = ctx.socket(zmq::SUB).map_err(connect_err)?;
        let timeout_ms = i32::try_from(poll_interval.as_millis()).unwrap_or(i32::MAX);
        socket.set_rcvtimeo(timeout_ms).map_err(connect_err)?;
        socket.set_linger(0).map_err(connect_err)?;
        socket.connect(&url).map_err(connect_err)?;
        socket.set_subscribe(b"").map_err(connect_err)?;

        tracing::debug!(endpoint = %url, timeout_ms, "SUB socket connected");

        Ok(Self {
            socket,
            endpoint: url,
        })
    }
}

impl FrameSource for ZmqSubscriber {
    fn recv_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.socket.recv_bytes(0) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(zmq::Error::EAGAIN) | Err(zmq::Error::EINTR) => Ok(None),
            Err(zmq::Error::ETERM) => Err(TransportError::Closed),
            Err(e) => Err(TransportError::Receive(e.to_string())),
        }
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
