use ember_primitives::{Log, SealedBlock, B256};

/// Errors a [`BlockProcessor`] reports back to the chain manager.
///
/// Only [`ProcessorError::Other`] is unconditionally fatal for an import;
/// the remaining variants let the chain manager skip or park the block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    /// The block has already been processed.
    #[error("block already known")]
    KnownBlock,
    /// The block's timestamp is ahead of the local clock.
    #[error("block in the future")]
    FutureBlock,
    /// The block's parent is not known to the processor.
    #[error("parent block {0} unknown")]
    ParentMissing(B256),
    /// Execution failed.
    #[error("{0}")]
    Other(String),
}

/// Executes the transactions of a block against current state.
#[auto_impl::auto_impl(&, Arc)]
pub trait BlockProcessor: Send + Sync {
    /// Process the block, returning the logs its transactions emitted.
    fn process(&self, block: &SealedBlock) -> Result<Vec<Log>, ProcessorError>;
}
