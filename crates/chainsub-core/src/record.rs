//! Decoded records handed to consumers.
//!
//! The listener and queue never look inside these; only decoders build them
//! and only consumers read them.

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// A 32-byte double-SHA256 identifier.
///
/// Stored in internal byte order; displayed byte-reversed, the way block
/// explorers and node RPCs print hashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Double-SHA256 of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        Self(second.into())
    }

    /// Byte-reversed lowercase hex.
    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

/// A decoded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    hash: Hash256,
    tx_count: u64,
    raw: Bytes,
}

impl Block {
    pub fn new(hash: Hash256, tx_count: u64, raw: Bytes) -> Self {
        Self { hash, tx_count, raw }
    }

    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Number of transactions announced by the block.
    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    /// The payload exactly as it arrived on the wire.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

/// A decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    hash: Hash256,
    raw: Bytes,
}

impl Transaction {
    pub fn new(hash: Hash256, raw: Bytes) -> Self {
        Self { hash, raw }
    }

    /// Double-SHA256 of the serialized payload. Equal to the txid for
    /// transactions without witness data.
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_displays_byte_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let h = Hash256(bytes);
        let hex = h.to_string();
        assert!(hex.starts_with("01"));
        assert!(hex.ends_with("ab"));
        assert_eq!(hex.len(), 64);
    }

    #[test]
    fn digest_is_double_sha256() {
        // sha256d("")
        assert_eq!(
            hex::encode(Hash256::digest(b"").0),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }
}
