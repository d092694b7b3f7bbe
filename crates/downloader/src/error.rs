use ember_interfaces::p2p::RequestError;

/// Errors produced by the downloader and its scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    /// A synchronisation is already running.
    #[error("busy")]
    Busy,
    /// The requested peer is not registered.
    #[error("peer is unknown or unhealthy")]
    UnknownPeer,
    /// The peer returned data it already delivered.
    #[error("action from bad peer ignored")]
    BadPeer,
    /// The peer delivers too few new hashes to make progress.
    #[error("peer is stalling")]
    StallingPeer,
    /// The peer's advertised head is on the banned list.
    #[error("peer head hash already banned")]
    BannedHead,
    /// All peers vanished mid-download.
    #[error("no peers to keep download active")]
    NoPeers,
    /// The previous sync left undelivered blocks behind.
    #[error("pending items in queue")]
    PendingQueue,
    /// No peer answered in time.
    #[error("timeout")]
    Timeout,
    /// The peer responded with an empty hash set.
    #[error("empty hash set by peer")]
    EmptyHashSet,
    /// No peer could take on scheduled work.
    #[error("no peers available or all peers tried for block download")]
    PeersUnavailable,
    /// The retrieved hash chain contains a banned hash or misplaced blocks.
    #[error("retrieved hash chain is invalid")]
    InvalidChain,
    /// A cross-checked block did not link where the hash chain claimed.
    #[error("block cross-check failed")]
    CrossCheckFailed,
    /// Hash fetching was cancelled.
    #[error("hash fetching cancelled (requested)")]
    CancelHashFetch,
    /// Block fetching was cancelled.
    #[error("block downloading cancelled (requested)")]
    CancelBlockFetch,
    /// A delivery arrived outside an active synchronisation.
    #[error("no sync active")]
    NoSyncActive,
    /// A delivery arrived from a peer without a reservation.
    #[error("no fetches pending")]
    NoFetchesPending,
    /// A delivery matched nothing that was requested.
    #[error("stale delivery")]
    StaleDelivery,
    /// A delivery mixed requested and unrequested blocks.
    #[error("partial delivery: {failed} of {total} blocks unrequested")]
    PartialDelivery {
        /// Number of unrequested blocks in the delivery.
        failed: usize,
        /// Total number of delivered blocks.
        total: usize,
    },
    /// The peer is already registered.
    #[error("peer is already registered")]
    AlreadyRegistered,
    /// The peer is not registered.
    #[error("peer is not registered")]
    NotRegistered,
    /// A peer under banning returned no blocks.
    #[error("no blocks returned to ban")]
    NoBlocksToBan,
    /// A peer under banning returned a batch not rooted at the banned hash.
    #[error("head block not the banned one")]
    BanHeadMismatch,
    /// Dispatching a request to a peer failed.
    #[error(transparent)]
    Request(#[from] RequestError),
}
