//! Canonical chain maintenance for ember.
//!
//! The [`ChainManager`] imports ordered block batches, verifies their
//! proof-of-work nonces in parallel, consults the external block processor,
//! persists accepted blocks through the [`BlockStore`] and reorganises onto
//! heavier forks. Chain notifications are dispatched in per-batch order by a
//! background worker that also re-submits parked future blocks.

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

mod cache;
mod config;
mod error;
mod events;
mod manager;
mod nonce;
mod rules;
mod store;

pub use cache::BlockCache;
pub use config::{
    ChainConfig, BLOCK_CACHE_LIMIT, FUTURE_BLOCK_INTERVAL, MAX_FUTURE_BLOCKS,
    MAX_TIME_FUTURE_BLOCKS,
};
pub use error::{ChainError, ExportError, InsertError};
pub use events::{
    ChainEvent, ChainHeadEvent, ChainNotification, ChainSideEvent, ChainSplitEvent,
};
pub use manager::ChainManager;
pub use rules::{calc_difficulty, calc_gas_limit, calc_td};
pub use store::{BlockStore, StoreError};
