//! `Listener`: a background receive loop bridging a subscription to an `ItemQueue`.
//!
//! # Lifecycle
//! ```text
//! Connecting ──▶ Receiving ──▶ Stopped   (stop() / shutdown() / drop)
//!                    │
//!                    └───────▶ Crashed   (transport failure, decode
//!                                         failure under Terminate, or a
//!                                         panic in the decoder)
//! ```
//!
//! A terminated listener is not restarted. `status()` exposes the terminal
//! error so consumers can tell a quiet stream from a dead one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crate::config::{DecodeErrorPolicy, ListenerConfig, StreamKind};
use crate::decoder::{BitcoinDecoder, RecordDecoder};
use crate::error::ListenerError;
use crate::framing::{BlockFraming, FramePhase, Framing, TransactionFraming};
use crate::queue::{ItemQueue, PopMode};
use crate::record::{Block, Transaction};
use crate::transport::{FrameSource, SubscriptionFactory};

/// Runtime state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Subscription opened, receive loop not yet running.
    Connecting,
    /// Receive loop running.
    Receiving,
    /// Loop ended after a stop request.
    Stopped,
    /// Loop ended on an unrecovered error.
    Crashed,
}

impl ListenerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connecting,
            1 => Self::Receiving,
            2 => Self::Stopped,
            _ => Self::Crashed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Crashed)
    }
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Receiving => write!(f, "receiving"),
            Self::Stopped => write!(f, "stopped"),
            Self::Crashed => write!(f, "crashed"),
        }
    }
}

/// Point-in-time view of a listener's health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStatus {
    pub state: ListenerState,
    pub frames_received: u64,
    pub items_enqueued: u64,
    pub decode_errors: u64,
    /// Why the loop crashed, once it has.
    pub failure: Option<ListenerError>,
}

/// Counters shared between the receive thread and listener handles.
#[derive(Debug)]
struct Health {
    state: AtomicU8,
    frames_received: AtomicU64,
    items_enqueued: AtomicU64,
    decode_errors: AtomicU64,
    failure: OnceLock<ListenerError>,
}

impl Health {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ListenerState::Connecting as u8),
            frames_received: AtomicU64::new(0),
            items_enqueued: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            failure: OnceLock::new(),
        }
    }

    fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ListenerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Records the failure before publishing `Crashed`.
    fn crash(&self, err: ListenerError) {
        let _ = self.failure.set(err);
        self.set_state(ListenerState::Crashed);
    }

    fn snapshot(&self) -> ListenerStatus {
        ListenerStatus {
            state: self.state(),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            items_enqueued: self.items_enqueued.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            failure: self.failure.get().cloned(),
        }
    }
}

/// Owns one subscription, one receive thread and one queue.
///
/// Dropping a listener asks its thread to stop but does not wait for it.
pub struct Listener<T> {
    endpoint: String,
    queue: ItemQueue<T>,
    health: Arc<Health>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), ListenerError>>>,
}

/// Listener on the block stream; items are `(depth, block)`.
pub type BlockListener = Listener<(u32, Block)>;

/// Listener on the transaction stream.
pub type TransactionListener = Listener<Transaction>;

impl<T: Send + 'static> Listener<T> {
    /// Start a receive loop over an already-connected source.
    pub fn spawn<S, F>(source: S, framing: F, config: &ListenerConfig) -> Result<Self, ListenerError>
    where
        S: FrameSource,
        F: Framing<Item = T>,
    {
        let endpoint = source.endpoint().to_string();
        let queue = ItemQueue::new();
        let health = Arc::new(Health::new());
        let stop = Arc::new(AtomicBool::new(false));

        let ctx = LoopContext {
            queue: queue.clone(),
            health: Arc::clone(&health),
            stop: Arc::clone(&stop),
            policy: config.on_decode_error,
            kind: config.kind,
        };

        let loop_health = Arc::clone(&health);
        let handle = thread::Builder::new()
            .name(config.thread_name())
            .spawn(move || {
                panic::catch_unwind(AssertUnwindSafe(|| receive_loop(source, framing, ctx)))
                    .unwrap_or_else(|_| {
                        tracing::error!("receive loop panicked");
                        loop_health.crash(ListenerError::Panicked);
                        Err(ListenerError::Panicked)
                    })
            })
            .map_err(|e| ListenerError::Spawn {
                reason: e.to_string(),
            })?;

        tracing::info!(endpoint = %endpoint, kind = %config.kind, "listener started");

        Ok(Self {
            endpoint,
            queue,
            health,
            stop,
            handle: Some(handle),
        })
    }

    /// Remove the oldest received item, waiting according to `mode`.
    pub fn pop(&self, mode: PopMode) -> Option<T> {
        self.queue.pop(mode)
    }

    /// Another handle onto this listener's queue, for consumer threads.
    pub fn queue(&self) -> ItemQueue<T> {
        self.queue.clone()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ListenerState {
        self.health.state()
    }

    /// `true` until the receive loop has terminated.
    pub fn is_alive(&self) -> bool {
        !self.state().is_terminal()
    }

    pub fn status(&self) -> ListenerStatus {
        self.health.snapshot()
    }

    /// Ask the receive loop to stop. Returns immediately; the loop notices
    /// within one poll interval.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop the loop and wait for it to exit.
    pub fn shutdown(self) -> Result<(), ListenerError> {
        self.stop();
        self.join()
    }

    /// Wait for the loop to exit on its own.
    pub fn join(mut self) -> Result<(), ListenerError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                if !self.health.state().is_terminal() {
                    self.health.crash(ListenerError::Panicked);
                }
                Err(ListenerError::Panicked)
            }
        }
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl BlockListener {
    /// Subscribe to the block stream and start listening, decoding with
    /// [`BitcoinDecoder`].
    pub fn connect<C: SubscriptionFactory>(ctx: &C, config: &ListenerConfig) -> Result<Self, ListenerError> {
        Self::connect_with_decoder(ctx, config, Arc::new(BitcoinDecoder))
    }

    pub fn connect_with_decoder<C: SubscriptionFactory>(
        ctx: &C,
        config: &ListenerConfig,
        decoder: Arc<dyn RecordDecoder>,
    ) -> Result<Self, ListenerError> {
        let source = open(ctx, config)?;
        Self::spawn(source, BlockFraming::new(decoder), config)
    }
}

impl TransactionListener {
    /// Subscribe to the transaction stream and start listening, decoding
    /// with [`BitcoinDecoder`].
    pub fn connect<C: SubscriptionFactory>(ctx: &C, config: &ListenerConfig) -> Result<Self, ListenerError> {
        Self::connect_with_decoder(ctx, config, Arc::new(BitcoinDecoder))
    }

    pub fn connect_with_decoder<C: SubscriptionFactory>(
        ctx: &C,
        config: &ListenerConfig,
        decoder: Arc<dyn RecordDecoder>,
    ) -> Result<Self, ListenerError> {
        let source = open(ctx, config)?;
        Self::spawn(source, TransactionFraming::new(decoder), config)
    }
}

fn open<C: SubscriptionFactory>(ctx: &C, config: &ListenerConfig) -> Result<C::Source, ListenerError> {
    let endpoint = config.endpoint();
    tracing::info!(endpoint = %endpoint, kind = %config.kind, "subscribing");
    ctx.subscribe(&endpoint, config.poll_interval())
        .map_err(ListenerError::Connect)
}

// ─── Receive loop ─────────────────────────────────────────────────────────────

struct LoopContext<T> {
    queue: ItemQueue<T>,
    health: Arc<Health>,
    stop: Arc<AtomicBool>,
    policy: DecodeErrorPolicy,
    kind: StreamKind,
}

impl<T> LoopContext<T> {
    fn enqueue(&self, item: T) {
        // Count first so a consumer that pops the item sees it counted.
        let n = self.health.items_enqueued.fetch_add(1, Ordering::Relaxed) + 1;
        self.queue.push(item);
        tracing::debug!(kind = %self.kind, enqueued = n, "item enqueued");
    }
}

fn receive_loop<S, F>(mut source: S, mut framing: F, ctx: LoopContext<F::Item>) -> Result<(), ListenerError>
where
    S: FrameSource,
    F: Framing,
{
    ctx.health.set_state(ListenerState::Receiving);

    loop {
        if ctx.stop.load(Ordering::Acquire) {
            // A block's two frames arrive as one multipart message, so the
            // payload is already buffered behind its depth.
            if matches!(framing.phase(), FramePhase::AwaitingPayload { .. }) {
                if let Ok(Some(frame)) = source.recv_frame() {
                    ctx.health.frames_received.fetch_add(1, Ordering::Relaxed);
                    match framing.accept(frame) {
                        Ok(Some(item)) => ctx.enqueue(item),
                        Ok(None) => {}
                        Err(e) => {
                            ctx.health.decode_errors.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(error = %e, kind = %ctx.kind, "dropping malformed frame on stop");
                        }
                    }
                }
            }
            if let Some(depth) = framing.reset() {
                tracing::debug!(depth, "discarding unfinished block pair on stop");
            }
            ctx.health.set_state(ListenerState::Stopped);
            tracing::info!(endpoint = source.endpoint(), kind = %ctx.kind, "listener stopped");
            return Ok(());
        }

        let frame = match source.recv_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(reason) => {
                let err = ListenerError::Disconnected {
                    endpoint: source.endpoint().to_string(),
                    discarded_depth: framing.reset(),
                    reason,
                };
                tracing::error!(error = %err, kind = %ctx.kind, "receive loop terminated");
                ctx.health.crash(err.clone());
                return Err(err);
            }
        };
        ctx.health.frames_received.fetch_add(1, Ordering::Relaxed);

        match framing.accept(frame) {
            Ok(Some(item)) => ctx.enqueue(item),
            Ok(None) => {}
            Err(e) => {
                ctx.health.decode_errors.fetch_add(1, Ordering::Relaxed);
                match ctx.policy {
                    DecodeErrorPolicy::Skip => {
                        framing.reset();
                        tracing::warn!(error = %e, kind = %ctx.kind, "skipping malformed frame");
                    }
                    DecodeErrorPolicy::Terminate => {
                        let err = ListenerError::Decode(e);
                        tracing::error!(error = %err, kind = %ctx.kind, "receive loop terminated");
                        ctx.health.crash(err.clone());
                        return Err(err);
                    }
                }
            }
        }
    }
}
