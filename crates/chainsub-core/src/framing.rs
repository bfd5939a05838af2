//! Frame assembly: turns a sequence of transport frames into queue items.
//!
//! # Block stream
//! ```text
//! AwaitingDepth ──[4-byte LE depth]──▶ AwaitingPayload { depth }
//!       ▲                                     │
//!       └──────[block payload → (depth, Block)]┘
//! ```
//!
//! # Transaction stream
//! Every frame is one transaction payload.

use std::sync::Arc;

use bytes::Bytes;

use crate::decoder::RecordDecoder;
use crate::error::{DecodeError, RecordKind};
use crate::record::{Block, Transaction};

/// Where a framing state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Next frame is a block depth prefix.
    AwaitingDepth,
    /// A depth arrived; next frame is its block payload.
    AwaitingPayload { depth: u32 },
    /// Next frame is a transaction payload.
    AwaitingTransaction,
}

/// Consumes frames one at a time and yields complete items.
pub trait Framing: Send + 'static {
    type Item: Send + 'static;

    /// Feed one frame. `Ok(Some(_))` when an item is complete.
    ///
    /// On error the machine is back at its initial phase.
    fn accept(&mut self, frame: Bytes) -> Result<Option<Self::Item>, DecodeError>;

    fn phase(&self) -> FramePhase;

    /// Drop any partially assembled item, returning a buffered depth if
    /// there was one.
    fn reset(&mut self) -> Option<u32>;
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

/// Two-frame block assembly yielding `(depth, Block)`.
pub struct BlockFraming {
    decoder: Arc<dyn RecordDecoder>,
    phase: FramePhase,
}

impl BlockFraming {
    pub fn new(decoder: Arc<dyn RecordDecoder>) -> Self {
        Self {
            decoder,
            phase: FramePhase::AwaitingDepth,
        }
    }
}

impl Framing for BlockFraming {
    type Item = (u32, Block);

    fn accept(&mut self, frame: Bytes) -> Result<Option<Self::Item>, DecodeError> {
        match self.phase {
            FramePhase::AwaitingPayload { depth } => {
                self.phase = FramePhase::AwaitingDepth;
                let block = self.decoder.decode_block(&frame)?;
                Ok(Some((depth, block)))
            }
            _ => {
                let depth = parse_depth(&frame)?;
                self.phase = FramePhase::AwaitingPayload { depth };
                Ok(None)
            }
        }
    }

    fn phase(&self) -> FramePhase {
        self.phase
    }

    fn reset(&mut self) -> Option<u32> {
        let discarded = match self.phase {
            FramePhase::AwaitingPayload { depth } => Some(depth),
            _ => None,
        };
        self.phase = FramePhase::AwaitingDepth;
        discarded
    }
}

/// The depth frame is exactly four bytes, little-endian.
pub fn parse_depth(frame: &[u8]) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = frame.try_into().map_err(|_| {
        DecodeError::new(RecordKind::Depth, "expected exactly 4 bytes", frame.len())
    })?;
    Ok(u32::from_le_bytes(bytes))
}

// ─── Transactions ─────────────────────────────────────────────────────────────

/// Single-frame transaction assembly.
pub struct TransactionFraming {
    decoder: Arc<dyn RecordDecoder>,
}

impl TransactionFraming {
    pub fn new(decoder: Arc<dyn RecordDecoder>) -> Self {
        Self { decoder }
    }
}

impl Framing for TransactionFraming {
    type Item = Transaction;

    fn accept(&mut self, frame: Bytes) -> Result<Option<Self::Item>, DecodeError> {
        self.decoder.decode_transaction(&frame).map(Some)
    }

    fn phase(&self) -> FramePhase {
        FramePhase::AwaitingTransaction
    }

    fn reset(&mut self) -> Option<u32> {
        None
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Hash256;

    /// Accepts any payload; the block's tx count is its length.
    struct LenDecoder;

    impl RecordDecoder for LenDecoder {
        fn decode_block(&self, raw: &Bytes) -> Result<Block, DecodeError> {
            if raw.is_empty() {
                return Err(DecodeError::new(RecordKind::Block, "empty", 0));
            }
            Ok(Block::new(Hash256::digest(raw), raw.len() as u64, raw.clone()))
        }

        fn decode_transaction(&self, raw: &Bytes) -> Result<Transaction, DecodeError> {
            if raw.is_empty() {
                return Err(DecodeError::new(RecordKind::Transaction, "empty", 0));
            }
            Ok(Transaction::new(Hash256::digest(raw), raw.clone()))
        }
    }

    fn blocks() -> BlockFraming {
        BlockFraming::new(Arc::new(LenDecoder))
    }

    #[test]
    fn depth_is_little_endian() {
        assert_eq!(parse_depth(&[0x05, 0, 0, 0]).unwrap(), 5);
        assert_eq!(parse_depth(&[0x01, 0x02, 0x03, 0x04]).unwrap(), 0x0403_0201);
    }

    #[test]
    fn depth_must_be_four_bytes() {
        let err = parse_depth(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind, RecordKind::Depth);
        assert_eq!(err.raw_len, 3);
        assert!(parse_depth(&[0; 5]).is_err());
    }

    #[test]
    fn block_pair_walks_the_state_machine() {
        let mut f = blocks();
        assert_eq!(f.phase(), FramePhase::AwaitingDepth);

        assert!(f.accept(Bytes::from_static(&[5, 0, 0, 0])).unwrap().is_none());
        assert_eq!(f.phase(), FramePhase::AwaitingPayload { depth: 5 });

        let (depth, block) = f.accept(Bytes::from_static(b"payload")).unwrap().unwrap();
        assert_eq!(depth, 5);
        assert_eq!(block.raw().as_ref(), b"payload");
        assert_eq!(f.phase(), FramePhase::AwaitingDepth);
    }

    #[test]
    fn reset_discards_buffered_depth() {
        let mut f = blocks();
        f.accept(Bytes::from_static(&[9, 0, 0, 0])).unwrap();
        assert_eq!(f.reset(), Some(9));
        assert_eq!(f.phase(), FramePhase::AwaitingDepth);
        assert_eq!(f.reset(), None);
    }

    #[test]
    fn bad_payload_returns_to_awaiting_depth() {
        let mut f = blocks();
        f.accept(Bytes::from_static(&[1, 0, 0, 0])).unwrap();
        assert!(f.accept(Bytes::new()).is_err());
        assert_eq!(f.phase(), FramePhase::AwaitingDepth);
    }

    #[test]
    fn bad_depth_stays_awaiting_depth() {
        let mut f = blocks();
        assert!(f.accept(Bytes::from_static(b"not-a-depth")).is_err());
        assert_eq!(f.phase(), FramePhase::AwaitingDepth);
    }

    #[test]
    fn transaction_per_frame() {
        let mut f = TransactionFraming::new(Arc::new(LenDecoder));
        let tx = f.accept(Bytes::from_static(b"tx-bytes")).unwrap().unwrap();
        assert_eq!(tx.raw().as_ref(), b"tx-bytes");
        assert_eq!(f.phase(), FramePhase::AwaitingTransaction);
        assert!(f.accept(Bytes::new()).is_err());
        assert_eq!(f.reset(), None);
    }
}
