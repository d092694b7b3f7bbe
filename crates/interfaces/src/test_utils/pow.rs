use crate::pow::PowVerifier;
use ember_primitives::{SealedBlock, B256};
use parking_lot::Mutex;
use std::collections::HashSet;

/// A [`PowVerifier`] that accepts every seal except explicitly failed hashes.
#[derive(Debug, Default)]
pub struct TestPow {
    invalid: Mutex<HashSet<B256>>,
}

impl TestPow {
    /// Treat the seal of the given block hash as invalid.
    pub fn fail_on(self, hash: B256) -> Self {
        self.invalid.lock().insert(hash);
        self
    }
}

impl PowVerifier for TestPow {
    fn verify(&self, block: &SealedBlock) -> bool {
        !self.invalid.lock().contains(&block.hash())
    }
}
