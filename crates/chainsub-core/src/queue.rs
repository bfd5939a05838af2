//! `ItemQueue`: the thread-safe hand-off between a listener and its consumers.
//!
//! One producer (the receive loop) pushes, any number of consumers pop.
//! Each item is delivered to exactly one `pop` caller, in FIFO order.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// How long `pop` is allowed to wait for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopMode {
    /// Return immediately, with `None` if the queue is empty.
    #[default]
    Immediate,
    /// Block until an item arrives.
    Forever,
    /// Block up to the given duration.
    Timeout(Duration),
}

impl PopMode {
    /// `Timeout(0)` is treated as `Immediate`.
    fn normalized(self) -> Self {
        match self {
            Self::Timeout(d) if d.is_zero() => Self::Immediate,
            other => other,
        }
    }
}

/// `None` blocks forever, `Some(0)` is non-blocking, `Some(d)` waits up to `d`.
impl From<Option<Duration>> for PopMode {
    fn from(timeout: Option<Duration>) -> Self {
        match timeout {
            None => Self::Forever,
            Some(d) => Self::Timeout(d).normalized(),
        }
    }
}

/// An unbounded multi-consumer FIFO.
///
/// Cloning yields another handle onto the same queue. The queue keeps its own
/// sender alive, so `push` never fails and `pop` never reports disconnection.
#[derive(Debug)]
pub struct ItemQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for ItemQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for ItemQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ItemQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Append an item. Visible to the next `pop` once this returns.
    pub fn push(&self, item: T) {
        // `self.rx` keeps the channel connected, so this cannot fail.
        let _ = self.tx.send(item);
    }

    /// Remove the oldest item, waiting according to `mode`.
    pub fn pop(&self, mode: PopMode) -> Option<T> {
        match mode.normalized() {
            PopMode::Immediate => match self.rx.try_recv() {
                Ok(item) => Some(item),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
            },
            PopMode::Forever => self.rx.recv().ok(),
            PopMode::Timeout(d) => match self.rx.recv_timeout(d) {
                Ok(item) => Some(item),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
            },
        }
    }

    /// Number of items waiting to be popped.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
