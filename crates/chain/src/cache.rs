use ember_primitives::{BlockHash, SealedBlock};
use schnellru::{ByLength, LruMap};
use std::sync::Arc;

/// A bounded, insertion-ordered index of recent blocks.
///
/// Reads go through [`LruMap::peek`] and never touch recency, so eviction
/// strictly follows insertion order: pushing into a full cache drops the
/// oldest entry. Not internally synchronized; callers lock around it.
pub struct BlockCache {
    inner: LruMap<BlockHash, Arc<SealedBlock>>,
}

impl BlockCache {
    /// Create a cache holding at most `limit` blocks.
    pub fn new(limit: u32) -> Self {
        Self { inner: LruMap::new(ByLength::new(limit)) }
    }

    /// Insert a block, evicting the oldest entry if the cache is full.
    pub fn push(&mut self, block: Arc<SealedBlock>) {
        self.inner.insert(block.hash(), block);
    }

    /// The cached block with the given hash, if any.
    pub fn get(&self, hash: &BlockHash) -> Option<Arc<SealedBlock>> {
        self.inner.peek(hash).cloned()
    }

    /// Whether a block with the given hash is cached.
    pub fn has(&self, hash: &BlockHash) -> bool {
        self.inner.peek(hash).is_some()
    }

    /// Remove the block with the given hash. Returns whether it was cached.
    pub fn remove(&mut self, hash: &BlockHash) -> bool {
        self.inner.remove(hash).is_some()
    }

    /// Visit all cached blocks in insertion order.
    pub fn each(&self, mut f: impl FnMut(&Arc<SealedBlock>)) {
        // The map iterates newest first.
        let blocks: Vec<_> = self.inner.iter().map(|(_, block)| block).collect();
        for block in blocks.into_iter().rev() {
            f(block);
        }
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache").field("len", &self.len()).finish()
    }
}
