use crate::store::StoreError;
use ember_interfaces::processor::ProcessorError;
use ember_primitives::{BlockHash, BlockNumber, B256, B64};

/// Errors produced while importing or rewinding the chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// A block's proof-of-work nonce failed verification.
    #[error("invalid nonce {nonce} in block #{number} ({hash})")]
    BlockNonce {
        /// Hash of the offending block.
        hash: BlockHash,
        /// Height of the offending block.
        number: BlockNumber,
        /// The rejected nonce.
        nonce: B64,
    },
    /// A block's hash is on the known-bad list.
    #[error("found known bad hash in chain: {0}")]
    BadHash(B256),
    /// A block's timestamp exceeds the future-block tolerance.
    #[error("block #{number} ({hash}) too far in the future: {time} > {max}")]
    TooFarInFuture {
        /// Hash of the offending block.
        hash: BlockHash,
        /// Height of the offending block.
        number: BlockNumber,
        /// The block's timestamp.
        time: u64,
        /// The highest tolerated timestamp.
        max: u64,
    },
    /// The old branch vanished while walking back to the fork point.
    #[error("reorg failed: invalid old chain")]
    InvalidOldChain,
    /// The new branch vanished while walking back to the fork point.
    #[error("reorg failed: invalid new chain")]
    InvalidNewChain,
    /// Block execution failed.
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The configured genesis does not match the one on disk.
    #[error("genesis mismatch: stored {stored}, configured {configured}")]
    GenesisMismatch {
        /// Hash of the genesis found in the store.
        stored: B256,
        /// Hash of the configured genesis.
        configured: B256,
    },
    /// The persisted head pointer references a block the store does not hold.
    #[error("head block {0} missing from store")]
    MissingHead(B256),
    /// A rewind walked past a block whose parent the store does not hold.
    #[error("parent {0} missing during rewind")]
    MissingParent(B256),
    /// No block processor has been configured.
    #[error("no block processor configured")]
    ProcessorUnset,
}

/// Failure of a chain import, pointing at the first failing block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("import failed at block {index}: {kind}")]
pub struct InsertError {
    /// Index of the failing block within the submitted batch.
    pub index: usize,
    /// What went wrong.
    #[source]
    pub kind: ChainError,
}

impl InsertError {
    pub(crate) const fn new(index: usize, kind: ChainError) -> Self {
        Self { index, kind }
    }
}

/// Errors produced while exporting canonical blocks.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The requested range is inverted.
    #[error("export failed: first ({first}) is greater than last ({last})")]
    InvalidRange {
        /// First requested height.
        first: BlockNumber,
        /// Last requested height.
        last: BlockNumber,
    },
    /// A block in the requested range is missing.
    #[error("export failed on #{0}: not found")]
    MissingBlock(BlockNumber),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The writer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
