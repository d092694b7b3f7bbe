//! Protocol constants for difficulty and gas-limit adjustment.

use alloy_primitives::U256;

/// The lowest difficulty a block may carry.
pub const MINIMUM_DIFFICULTY: U256 = U256::from_limbs([131_072, 0, 0, 0]);

/// Divisor bounding per-block difficulty adjustment.
pub const DIFFICULTY_BOUND_DIVISOR: U256 = U256::from_limbs([2048, 0, 0, 0]);

/// Block time threshold, in seconds, below which difficulty increases.
pub const DURATION_LIMIT: u64 = 13;

/// Divisor bounding per-block gas-limit adjustment.
pub const GAS_LIMIT_BOUND_DIVISOR: U256 = U256::from_limbs([1024, 0, 0, 0]);

/// The lowest gas limit a block may carry.
pub const MIN_GAS_LIMIT: U256 = U256::from_limbs([125_000, 0, 0, 0]);

/// Gas limit of the genesis block, targeted while the chain ramps up.
pub const GENESIS_GAS_LIMIT: U256 = U256::from_limbs([3_141_592, 0, 0, 0]);
