//! Difficulty and gas-limit adjustment rules.

use ember_primitives::{
    constants::{
        DIFFICULTY_BOUND_DIVISOR, DURATION_LIMIT, GAS_LIMIT_BOUND_DIVISOR, GENESIS_GAS_LIMIT,
        MINIMUM_DIFFICULTY, MIN_GAS_LIMIT,
    },
    Header, U256,
};

/// The difficulty a block sealed at `time` on top of `parent` must carry.
///
/// Fast blocks raise the difficulty by `parent.difficulty / 2048`, slow
/// blocks lower it by the same amount, clamped to the protocol minimum.
pub fn calc_difficulty(time: u64, parent: &Header) -> U256 {
    let adjust = parent.difficulty / DIFFICULTY_BOUND_DIVISOR;
    let diff = if time.saturating_sub(parent.time) < DURATION_LIMIT {
        parent.difficulty + adjust
    } else {
        parent.difficulty.saturating_sub(adjust)
    };
    diff.max(MINIMUM_DIFFICULTY)
}

/// The gas limit a child of `parent` must carry.
///
/// The limit decays towards 50% utilization and is floored at the protocol
/// minimum; while below the genesis gas limit it ramps back up towards it.
pub fn calc_gas_limit(parent: &Header) -> U256 {
    let decay = parent.gas_limit / GAS_LIMIT_BOUND_DIVISOR;
    let contrib = (parent.gas_used * U256::from(3) / U256::from(2)) / GAS_LIMIT_BOUND_DIVISOR;

    let gl = (parent.gas_limit.saturating_sub(decay) + contrib + U256::from(1)).max(MIN_GAS_LIMIT);
    if gl < GENESIS_GAS_LIMIT {
        return GENESIS_GAS_LIMIT.min(parent.gas_limit + decay);
    }
    gl
}

/// The total difficulty of a block given its parent's total difficulty.
pub fn calc_td(difficulty: U256, parent_td: Option<U256>) -> U256 {
    match parent_td {
        Some(td) => td + difficulty,
        None => difficulty,
    }
}
