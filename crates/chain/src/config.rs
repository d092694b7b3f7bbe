use ember_primitives::B256;
use std::{collections::HashSet, time::Duration};

/// Limit of the recent-chain block cache.
pub const BLOCK_CACHE_LIMIT: u32 = 10_000;

/// Limit of the future-block holding area.
pub const MAX_FUTURE_BLOCKS: u32 = 256;

/// How far ahead of the wall clock, in seconds, a block may be and still be
/// parked instead of rejected.
pub const MAX_TIME_FUTURE_BLOCKS: u64 = 30;

/// Period of the background future-block drain.
pub const FUTURE_BLOCK_INTERVAL: Duration = Duration::from_secs(5);

/// Tunables of the chain manager.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Hashes of blocks known to be bad. A block whose hash is listed here is
    /// rejected on import, and a chain containing one is rewound on startup.
    pub bad_hashes: HashSet<B256>,
    /// Capacity of the recent-chain cache.
    pub block_cache_limit: u32,
    /// Capacity of the future-block holding area.
    pub max_future_blocks: u32,
    /// Tolerated clock skew for future blocks, in seconds.
    pub max_time_future_blocks: u64,
    /// Period of the background future-block drain.
    pub future_block_interval: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            bad_hashes: HashSet::new(),
            block_cache_limit: BLOCK_CACHE_LIMIT,
            max_future_blocks: MAX_FUTURE_BLOCKS,
            max_time_future_blocks: MAX_TIME_FUTURE_BLOCKS,
            future_block_interval: FUTURE_BLOCK_INTERVAL,
        }
    }
}

impl ChainConfig {
    /// Add a known-bad block hash.
    pub fn with_bad_hash(mut self, hash: B256) -> Self {
        self.bad_hashes.insert(hash);
        self
    }
}
