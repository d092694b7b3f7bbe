use ember_primitives::B256;
use std::{collections::HashSet, time::Duration};

/// Minimum number of new hashes per response before a peer counts as
/// stalling the sync.
pub const MIN_HASH_FETCH: usize = 512;

/// Number of hashes a peer returns per retrieval request.
pub const MAX_HASH_FETCH: usize = 2048;

/// Maximum number of blocks fetched from one peer per request; also the
/// ceiling of a peer's earned capacity.
pub const MAX_BLOCK_FETCH: usize = 128;

/// Time before an outstanding hash request is retried elsewhere.
pub const HASH_TTL: Duration = Duration::from_secs(5);

/// Request completion threshold used for cross-check expiry.
pub const BLOCK_SOFT_TTL: Duration = Duration::from_secs(3);

/// Time before a block reservation is considered expired.
pub const BLOCK_HARD_TTL: Duration = Duration::from_secs(9);

/// Period of the expired cross-check scan.
pub const CROSS_CHECK_CYCLE: Duration = Duration::from_secs(1);

/// Period of the block scheduling tick.
pub const FETCH_TICK: Duration = Duration::from_millis(20);

/// Number of bannable hashes kept before phasing old ones out.
pub const MAX_BANNED_HASHES: usize = 4096;

/// Capacity of the download result cache.
pub const BLOCK_CACHE_LIMIT: usize = 8 * MAX_BLOCK_FETCH;

/// Tunables of the downloader.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Minimum number of new hashes per response before a peer counts as
    /// stalling.
    pub min_hash_fetch: usize,
    /// Maximum number of blocks requested from one peer at once.
    pub max_block_fetch: usize,
    /// Timeout of a hash request.
    pub hash_ttl: Duration,
    /// Expiry of a registered cross-check.
    pub block_soft_ttl: Duration,
    /// Expiry of a block reservation.
    pub block_hard_ttl: Duration,
    /// Period of the expired cross-check scan.
    pub cross_check_cycle: Duration,
    /// Period of the block scheduling tick.
    pub fetch_tick: Duration,
    /// Bound of the banned-hash set.
    pub max_banned_hashes: usize,
    /// Capacity of the download result cache.
    pub block_cache_limit: usize,
    /// Hard-coded bad head hashes; seeded into the banned set and never
    /// phased out.
    pub bad_hashes: HashSet<B256>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            min_hash_fetch: MIN_HASH_FETCH,
            max_block_fetch: MAX_BLOCK_FETCH,
            hash_ttl: HASH_TTL,
            block_soft_ttl: BLOCK_SOFT_TTL,
            block_hard_ttl: BLOCK_HARD_TTL,
            cross_check_cycle: CROSS_CHECK_CYCLE,
            fetch_tick: FETCH_TICK,
            max_banned_hashes: MAX_BANNED_HASHES,
            block_cache_limit: BLOCK_CACHE_LIMIT,
            bad_hashes: HashSet::new(),
        }
    }
}

impl DownloaderConfig {
    /// Add a hard-coded bad head hash.
    pub fn with_bad_hash(mut self, hash: B256) -> Self {
        self.bad_hashes.insert(hash);
        self
    }
}
