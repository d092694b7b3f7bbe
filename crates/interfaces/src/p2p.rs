use ember_primitives::B256;

/// Errors that can happen when dispatching a request to a peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The channel to the peer is gone.
    #[error("channel to the peer closed")]
    ChannelClosed,
    /// The peer is already serving a request.
    #[error("peer is already serving a request")]
    Busy,
}

/// Result alias for requests to a peer.
pub type RequestResult<T> = Result<T, RequestError>;

/// Transport handle for a single remote peer.
///
/// Requests are asynchronous: dispatching only enqueues the request, and the
/// reply eventually arrives through the downloader's `deliver_hashes` /
/// `deliver_blocks` entry points, tagged with the peer id.
#[auto_impl::auto_impl(&, Arc)]
pub trait PeerClient: Send + Sync {
    /// Request a batch of block hashes walking backwards from `from`.
    fn get_hashes(&self, from: B256) -> RequestResult<()>;

    /// Request the blocks with the given hashes.
    fn get_blocks(&self, hashes: &[B256]) -> RequestResult<()>;
}
