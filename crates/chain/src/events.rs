use ember_primitives::{BlockHash, Log, SealedBlock};
use std::sync::Arc;

/// A block became the canonical head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    /// The new head block.
    pub block: Arc<SealedBlock>,
    /// Hash of the new head block.
    pub hash: BlockHash,
    /// Logs emitted while processing the block.
    pub logs: Vec<Log>,
}

/// A block was stored on a non-canonical branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSideEvent {
    /// The side-chain block.
    pub block: Arc<SealedBlock>,
    /// Logs emitted while processing the block.
    pub logs: Vec<Log>,
}

/// A fork overtook the canonical chain; a [`ChainEvent`] for the new head
/// follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSplitEvent {
    /// The block that triggered the reorganisation.
    pub block: Arc<SealedBlock>,
    /// Logs emitted while processing the block.
    pub logs: Vec<Log>,
}

/// The canonical head settled on a new block.
///
/// Emitted by the background worker once the dispatched head still matches
/// the chain head, so rapid imports coalesce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHeadEvent {
    /// The head block.
    pub block: Arc<SealedBlock>,
}

/// Notifications posted by the chain manager.
///
/// One import batch produces one ordered group of notifications, dispatched
/// together after the batch completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainNotification {
    /// A block became the canonical head.
    Chain(ChainEvent),
    /// A block was stored on a side branch.
    Side(ChainSideEvent),
    /// A reorganisation occurred.
    Split(ChainSplitEvent),
    /// The head settled.
    Head(ChainHeadEvent),
}
