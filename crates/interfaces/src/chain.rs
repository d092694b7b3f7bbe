use ember_primitives::{BlockNumber, B256};

/// The view of the local chain the downloader needs.
///
/// Implemented by the chain manager; test fixtures implement it over a plain
/// hash set.
#[auto_impl::auto_impl(&, Arc)]
pub trait LocalChain: Send + Sync {
    /// Whether the chain has the block with the given hash.
    fn has_block(&self, hash: B256) -> bool;

    /// The height of the block with the given hash, if known.
    fn block_number(&self, hash: B256) -> Option<BlockNumber>;
}
