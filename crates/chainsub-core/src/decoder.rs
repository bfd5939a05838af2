//! The `RecordDecoder` trait: the seam between raw payload bytes and records.
//!
//! Decoders are pure: the same bytes always produce the same record or the
//! same error. The trait is object-safe so listeners hold an
//! `Arc<dyn RecordDecoder>`.

use bytes::Bytes;

use crate::error::{DecodeError, RecordKind};
use crate::record::{Block, Hash256, Transaction};

/// Turns raw payload frames into records.
pub trait RecordDecoder: Send + Sync {
    fn decode_block(&self, raw: &Bytes) -> Result<Block, DecodeError>;

    fn decode_transaction(&self, raw: &Bytes) -> Result<Transaction, DecodeError>;
}

/// Size of a serialized Bitcoin block header.
pub const BLOCK_HEADER_LEN: usize = 80;

/// Smallest possible serialized transaction: version, empty input and
/// output counts, lock time.
pub const MIN_TRANSACTION_LEN: usize = 10;

/// Decoder for Bitcoin consensus-serialized blocks and transactions.
///
/// Only the header hash and the transaction count are read; everything else
/// stays in the raw payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitcoinDecoder;

impl RecordDecoder for BitcoinDecoder {
    fn decode_block(&self, raw: &Bytes) -> Result<Block, DecodeError> {
        if raw.len() < BLOCK_HEADER_LEN {
            return Err(DecodeError::new(
                RecordKind::Block,
                format!("shorter than the {BLOCK_HEADER_LEN}-byte header"),
                raw.len(),
            ));
        }
        let tx_count = read_compact_size(&raw[BLOCK_HEADER_LEN..])
            .ok_or_else(|| DecodeError::new(RecordKind::Block, "truncated transaction count", raw.len()))?;
        let hash = Hash256::digest(&raw[..BLOCK_HEADER_LEN]);
        Ok(Block::new(hash, tx_count, raw.clone()))
    }

    fn decode_transaction(&self, raw: &Bytes) -> Result<Transaction, DecodeError> {
        if raw.len() < MIN_TRANSACTION_LEN {
            return Err(DecodeError::new(
                RecordKind::Transaction,
                format!("shorter than the {MIN_TRANSACTION_LEN}-byte minimum"),
                raw.len(),
            ));
        }
        Ok(Transaction::new(Hash256::digest(raw), raw.clone()))
    }
}

/// Read a Bitcoin compact-size integer from the start of `buf`.
fn read_compact_size(buf: &[u8]) -> Option<u64> {
    let (&first, rest) = buf.split_first()?;
    let width = match first {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        n => return Some(u64::from(n)),
    };
    let bytes = rest.get(..width)?;
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(bytes);
    Some(u64::from_le_bytes(le))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";
    const GENESIS_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

    fn genesis_block() -> Bytes {
        let mut raw = hex::decode(GENESIS_HEADER).unwrap();
        raw.push(0x01);
        raw.extend(hex::decode(GENESIS_COINBASE).unwrap());
        Bytes::from(raw)
    }

    #[test]
    fn decodes_genesis_block() {
        let block = BitcoinDecoder.decode_block(&genesis_block()).unwrap();
        assert_eq!(
            block.hash().to_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(block.tx_count(), 1);
        assert_eq!(block.size(), 285);
    }

    #[test]
    fn decodes_genesis_coinbase() {
        let raw = Bytes::from(hex::decode(GENESIS_COINBASE).unwrap());
        let tx = BitcoinDecoder.decode_transaction(&raw).unwrap();
        assert_eq!(
            tx.hash().to_string(),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
        assert_eq!(tx.raw(), &raw);
    }

    #[test]
    fn rejects_short_block() {
        let err = BitcoinDecoder
            .decode_block(&Bytes::from_static(&[0u8; 79]))
            .unwrap_err();
        assert_eq!(err.kind, RecordKind::Block);
        assert_eq!(err.raw_len, 79);
    }

    #[test]
    fn rejects_header_without_tx_count() {
        let raw = Bytes::from(hex::decode(GENESIS_HEADER).unwrap());
        let err = BitcoinDecoder.decode_block(&raw).unwrap_err();
        assert!(err.reason.contains("transaction count"));
    }

    #[test]
    fn rejects_short_transaction() {
        let err = BitcoinDecoder
            .decode_transaction(&Bytes::from_static(b"tiny"))
            .unwrap_err();
        assert_eq!(err.kind, RecordKind::Transaction);
        assert_eq!(err.raw_len, 4);
    }

    #[test]
    fn compact_size_widths() {
        assert_eq!(read_compact_size(&[0x05]), Some(5));
        assert_eq!(read_compact_size(&[0xfd, 0x34, 0x12]), Some(0x1234));
        assert_eq!(read_compact_size(&[0xfe, 0x01, 0x00, 0x00, 0x01]), Some(0x0100_0001));
        assert_eq!(read_compact_size(&[0xff, 1, 0, 0, 0, 0, 0, 0, 0]), Some(1));
        assert_eq!(read_compact_size(&[0xfd, 0x01]), None);
        assert_eq!(read_compact_size(&[]), None);
    }
}
