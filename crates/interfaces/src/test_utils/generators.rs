use ember_primitives::{
    constants::{GENESIS_GAS_LIMIT, MINIMUM_DIFFICULTY},
    Block, Header, SealedBlock, B256, B64, U256,
};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// The local wall clock in unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_secs()
}

/// A random 32-byte hash.
pub fn random_hash() -> B256 {
    B256::from(rand::random::<[u8; 32]>())
}

/// A genesis block with the protocol's minimum difficulty.
pub fn genesis_block() -> SealedBlock {
    Block {
        header: Header {
            number: 0,
            difficulty: MINIMUM_DIFFICULTY,
            gas_limit: GENESIS_GAS_LIMIT,
            ..Default::default()
        },
        ..Default::default()
    }
    .seal_slow()
}

/// A child of `parent` with the given difficulty and timestamp.
///
/// The header is linked but carries no valid proof of work; pair it with
/// [`TestPow`](super::TestPow).
pub fn child_block(parent: &SealedBlock, difficulty: U256, time: u64) -> SealedBlock {
    Block {
        header: Header {
            parent_hash: parent.hash(),
            number: parent.number() + 1,
            time,
            difficulty,
            gas_limit: parent.header().gas_limit,
            gas_used: U256::ZERO,
            nonce: B64::from((parent.number() + 1).to_be_bytes()),
            state_root: B256::with_last_byte((parent.number() + 1) as u8),
        },
        ..Default::default()
    }
    .seal_slow()
}

/// A linked chain of `len` blocks on top of `parent`, at constant difficulty
/// and 13-second block times.
pub fn linear_chain(parent: &SealedBlock, len: usize) -> Vec<Arc<SealedBlock>> {
    let mut chain = Vec::with_capacity(len);
    let mut parent = parent.clone();
    for _ in 0..len {
        let block = child_block(&parent, MINIMUM_DIFFICULTY, parent.header().time + 13);
        chain.push(Arc::new(block.clone()));
        parent = block;
    }
    chain
}
