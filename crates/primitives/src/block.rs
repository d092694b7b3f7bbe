use crate::{BlockHash, BlockNumber, Header, Receipt, SealedHeader, Transaction};
use alloy_primitives::{B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use derive_more::Deref;

/// A block: header plus uncle headers, transactions and receipts.
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// Headers of the block's uncles.
    pub uncles: Vec<Header>,
    /// The block's transactions.
    pub transactions: Vec<Transaction>,
    /// Receipts of the block's transactions.
    pub receipts: Vec<Receipt>,
}

impl Block {
    /// Seal the block with the recomputed header hash.
    pub fn seal_slow(self) -> SealedBlock {
        let Self { header, uncles, transactions, receipts } = self;
        SealedBlock { header: header.seal_slow(), uncles, transactions, receipts }
    }
}

/// A [`Block`] whose header carries its memoized hash.
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct SealedBlock {
    /// The sealed header.
    #[deref]
    pub header: SealedHeader,
    /// Headers of the block's uncles.
    pub uncles: Vec<Header>,
    /// The block's transactions.
    pub transactions: Vec<Transaction>,
    /// Receipts of the block's transactions.
    pub receipts: Vec<Receipt>,
}

impl SealedBlock {
    /// The hash of the block's header.
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// The height of the block.
    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    /// The hash of the parent block.
    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// Discard the memoized header hash.
    pub fn unseal(self) -> Block {
        let Self { header, uncles, transactions, receipts } = self;
        Block { header: header.unseal(), uncles, transactions, receipts }
    }
}

impl Default for SealedBlock {
    fn default() -> Self {
        Block::default().seal_slow()
    }
}

/// The persisted form of a block: the block plus its stored total difficulty.
///
/// This is the canonical encoding written under the `block-hash-` keyspace.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct StoredBlock {
    /// The stored block.
    pub block: Block,
    /// Total difficulty of the chain up to and including this block.
    pub td: U256,
}

impl StoredBlock {
    /// Build the persisted form of a sealed block.
    pub fn new(block: &SealedBlock, td: U256) -> Self {
        Self { block: block.clone().unseal(), td }
    }

    /// Split into the sealed block and its total difficulty.
    pub fn split(self) -> (SealedBlock, U256) {
        (self.block.seal_slow(), self.td)
    }
}
