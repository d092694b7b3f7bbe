//! Chain synchronisation for ember.
//!
//! The [`Downloader`] drives a two-phase sync against a chosen peer: first
//! the hash chain is fetched backwards from the advertised head until a
//! locally known block is found, with random single-block cross-checks
//! guarding against fabricated chains; then the block bodies are scheduled
//! over all idle peers through the [`DownloadQueue`], with per-peer
//! reputation deciding chunk sizes and misbehaving peers ending up on a
//! bounded ban list.

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

mod config;
mod downloader;
mod error;
mod events;
mod peer;
mod queue;

pub use config::{
    DownloaderConfig, BLOCK_CACHE_LIMIT, BLOCK_HARD_TTL, BLOCK_SOFT_TTL, CROSS_CHECK_CYCLE,
    FETCH_TICK, HASH_TTL, MAX_BANNED_HASHES, MAX_BLOCK_FETCH, MAX_HASH_FETCH, MIN_HASH_FETCH,
};
pub use downloader::{Downloader, DownloaderStats};
pub use error::DownloadError;
pub use events::SyncEvent;
pub use peer::{Peer, PeerError, PeerId, PeerSet};
pub use queue::{DownloadQueue, DownloadedBlock, Request};
