use super::unix_now;
use crate::processor::{BlockProcessor, ProcessorError};
use ember_primitives::{Log, SealedBlock, B256};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// A [`BlockProcessor`] emulating the outcomes the chain manager reacts to.
///
/// Blocks are "executed" by remembering their hash: re-processing yields
/// [`ProcessorError::KnownBlock`], a timestamp ahead of the wall clock yields
/// [`ProcessorError::FutureBlock`], and an unknown parent yields
/// [`ProcessorError::ParentMissing`]. Individual blocks can be forced to a
/// fixed outcome.
#[derive(Debug, Default)]
pub struct TestProcessor {
    known: Mutex<HashSet<B256>>,
    forced: Mutex<HashMap<B256, ProcessorError>>,
}

impl TestProcessor {
    /// A processor that considers the given genesis executed.
    pub fn new(genesis_hash: B256) -> Self {
        let this = Self::default();
        this.known.lock().insert(genesis_hash);
        this
    }

    /// Force a fixed outcome for the given block hash.
    pub fn force(&self, hash: B256, err: ProcessorError) {
        self.forced.lock().insert(hash, err);
    }

    /// Mark a block hash as already executed.
    pub fn mark_known(&self, hash: B256) {
        self.known.lock().insert(hash);
    }
}

impl BlockProcessor for TestProcessor {
    fn process(&self, block: &SealedBlock) -> Result<Vec<Log>, ProcessorError> {
        if let Some(err) = self.forced.lock().get(&block.hash()) {
            return Err(err.clone());
        }
        let mut known = self.known.lock();
        if known.contains(&block.hash()) {
            return Err(ProcessorError::KnownBlock);
        }
        if block.header().time > unix_now() {
            return Err(ProcessorError::FutureBlock);
        }
        if !known.contains(&block.parent_hash()) {
            return Err(ProcessorError::ParentMissing(block.parent_hash()));
        }
        known.insert(block.hash());
        Ok(Vec::new())
    }
}
