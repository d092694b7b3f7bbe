//! Commonly used types for the ember chain core.
//!
//! Blocks are cheap to share: sealed variants carry their hash and are
//! handed around behind [`std::sync::Arc`] by the chain manager and the
//! downloader.

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

mod block;
mod header;
mod log;
mod receipt;
mod transaction;

pub mod constants;

pub use block::{Block, SealedBlock, StoredBlock};
pub use header::{Header, SealedHeader};
pub use log::Log;
pub use receipt::Receipt;
pub use transaction::Transaction;

pub use alloy_primitives::{self, keccak256, Bytes, B256, B64, U256};

/// A block hash.
pub type BlockHash = B256;

/// A block number.
pub type BlockNumber = u64;
