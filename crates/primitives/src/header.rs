use crate::{BlockHash, BlockNumber};
use alloy_primitives::{keccak256, B256, B64, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use derive_more::Deref;

/// A block header.
///
/// The hash of a header is a deterministic function of all of its fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, RlpEncodable, RlpDecodable)]
pub struct Header {
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Height of the block. The genesis block has number zero.
    pub number: BlockNumber,
    /// Timestamp of the block in unix seconds.
    pub time: u64,
    /// Proof-of-work difficulty target of this block.
    pub difficulty: U256,
    /// Maximum gas the block may consume.
    pub gas_limit: U256,
    /// Gas consumed by the block's transactions.
    pub gas_used: U256,
    /// Proof-of-work solution.
    pub nonce: B64,
    /// Root of the post-execution state.
    pub state_root: B256,
}

impl Header {
    /// Heavy function that recomputes the hash of the header.
    pub fn hash_slow(&self) -> BlockHash {
        keccak256(alloy_rlp::encode(self))
    }

    /// Seal the header with its computed hash.
    pub fn seal_slow(self) -> SealedHeader {
        let hash = self.hash_slow();
        SealedHeader { header: self, hash }
    }

    /// Seal the header with a known hash.
    ///
    /// WARNING: the hash is not verified against the header.
    pub fn seal(self, hash: BlockHash) -> SealedHeader {
        SealedHeader { header: self, hash }
    }
}

/// A [`Header`] together with its memoized hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref)]
pub struct SealedHeader {
    /// The sealed header.
    #[deref]
    header: Header,
    /// The memoized hash of the header.
    hash: BlockHash,
}

impl SealedHeader {
    /// The hash of the header.
    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    /// The inner header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Discard the memoized hash.
    pub fn unseal(self) -> Header {
        self.header
    }
}

impl Default for SealedHeader {
    fn default() -> Self {
        Header::default().seal_slow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_changes_with_any_field() {
        let base = Header { number: 7, difficulty: U256::from(131_072u64), ..Default::default() };
        let mut touched = base.clone();
        touched.time = 1;
        assert_ne!(base.hash_slow(), touched.hash_slow());

        let mut touched = base.clone();
        touched.nonce = B64::from([1, 0, 0, 0, 0, 0, 0, 0]);
        assert_ne!(base.hash_slow(), touched.hash_slow());
    }

    #[test]
    fn seal_memoizes_hash() {
        let header = Header { number: 3, ..Default::default() };
        let hash = header.hash_slow();
        let sealed = header.seal_slow();
        assert_eq!(sealed.hash(), hash);
        assert_eq!(sealed.unseal().hash_slow(), hash);
    }

    #[test]
    fn header_rlp_roundtrip() {
        let header = Header {
            parent_hash: B256::repeat_byte(1),
            number: 100,
            time: 1_438_269_988,
            difficulty: U256::from(131_072u64),
            gas_limit: U256::from(3_141_592u64),
            gas_used: U256::from(21_000u64),
            nonce: B64::from([0, 1, 2, 3, 4, 5, 6, 7]),
            state_root: B256::repeat_byte(2),
        };
        let encoded = alloy_rlp::encode(&header);
        let decoded = <Header as alloy_rlp::Decodable>::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(header, decoded);
    }
}
