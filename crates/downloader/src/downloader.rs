use crate::{
    config::DownloaderConfig,
    error::DownloadError,
    events::SyncEvent,
    peer::{Peer, PeerError, PeerId, PeerSet},
    queue::{DownloadQueue, DownloadedBlock},
};
use ember_interfaces::{chain::LocalChain, p2p::PeerClient};
use ember_primitives::{SealedBlock, B256};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{broadcast, mpsc},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Capacity of the sync event channel handed to subscribers.
const EVENT_CAPACITY: usize = 64;

/// A batch of hashes delivered by a peer.
#[derive(Debug)]
struct HashPack {
    peer_id: PeerId,
    hashes: Vec<B256>,
}

/// A batch of blocks delivered by a peer.
#[derive(Debug)]
struct BlockPack {
    peer_id: PeerId,
    blocks: Vec<Arc<SealedBlock>>,
}

/// An outstanding single-block verification of a delivered hash chain.
#[derive(Debug, Clone, Copy)]
struct CrossCheck {
    expire: Instant,
    parent: B256,
}

/// Delivery endpoints of the active synchronisation.
struct SyncConn {
    hash_tx: mpsc::Sender<HashPack>,
    block_tx: mpsc::Sender<BlockPack>,
    cancel: CancellationToken,
}

impl SyncConn {
    /// A connection that accepts nothing, installed while no sync runs.
    fn closed() -> Self {
        let (hash_tx, _) = mpsc::channel(1);
        let (block_tx, _) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        Self { hash_tx, block_tx, cancel }
    }
}

/// Import progress of the blocks most recently taken from the queue.
#[derive(Debug, Default)]
struct ImportState {
    start: Option<Instant>,
    queue: VecDeque<DownloadedBlock>,
    done: usize,
}

/// A bounded first-in-first-out set of banned head hashes.
///
/// Hard-coded bans are seeded at construction and never phased out.
#[derive(Debug)]
struct BannedSet {
    limit: usize,
    set: HashSet<B256>,
    order: VecDeque<B256>,
}

impl BannedSet {
    fn new(hard: &HashSet<B256>, limit: usize) -> Self {
        Self { limit, set: hard.clone(), order: VecDeque::new() }
    }

    fn contains(&self, hash: &B256) -> bool {
        self.set.contains(hash)
    }

    /// Insert a soft ban, phasing out the oldest soft bans beyond the limit.
    /// Returns whether the hash was new.
    fn insert(&mut self, hash: B256) -> bool {
        if !self.set.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        while self.set.len() > self.limit {
            let Some(oldest) = self.order.pop_front() else { break };
            self.set.remove(&oldest);
        }
        true
    }

    fn len(&self) -> usize {
        self.set.len()
    }
}

/// Progress numbers of an ongoing synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloaderStats {
    /// Hashes scheduled but not yet delivered.
    pub pending: usize,
    /// Blocks delivered but not yet taken.
    pub cached: usize,
    /// Blocks taken but not yet in the chain.
    pub importing: usize,
    /// Rough estimate of the remaining sync time.
    pub estimate: Duration,
}

/// What the hash-fetch state machine selected on.
enum FetchEvent {
    Hashes(HashPack),
    Blocks(BlockPack),
    CrossTick,
    Timeout,
}

/// Synchronises the local chain with remote peers: fetches the hash chain
/// from the best peer, cross-checks random segments against single-block
/// fetches, then schedules the block bodies across all idle peers with
/// reputation-weighted chunk sizes.
///
/// At most one synchronisation runs at a time; deliveries from the network
/// are injected through [`deliver_hashes`](Self::deliver_hashes) and
/// [`deliver_blocks`](Self::deliver_blocks).
pub struct Downloader<C> {
    config: DownloaderConfig,
    chain: C,
    queue: Mutex<DownloadQueue>,
    peers: PeerSet,
    /// Outstanding hash-chain cross checks.
    checks: Mutex<HashMap<B256, CrossCheck>>,
    banned: Mutex<BannedSet>,
    conn: RwLock<SyncConn>,
    events: broadcast::Sender<SyncEvent>,
    import: Mutex<ImportState>,
    synchronising: AtomicBool,
    notified: AtomicBool,
}

impl<C: LocalChain> Downloader<C> {
    /// Create a downloader over the given local-chain view.
    pub fn new(chain: C, config: DownloaderConfig) -> Self {
        let banned = BannedSet::new(&config.bad_hashes, config.max_banned_hashes);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            queue: Mutex::new(DownloadQueue::new(config.block_cache_limit)),
            peers: PeerSet::new(),
            checks: Mutex::new(HashMap::new()),
            banned: Mutex::new(banned),
            conn: RwLock::new(SyncConn::closed()),
            events,
            import: Mutex::new(ImportState::default()),
            synchronising: AtomicBool::new(false),
            notified: AtomicBool::new(false),
            chain,
            config,
        }
    }

    /// Subscribe to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Whether a synchronisation is currently running.
    pub fn synchronising(&self) -> bool {
        self.synchronising.load(Ordering::SeqCst)
    }

    /// Whether the downloader knows the hash, already downloaded or pending
    /// retrieval.
    pub fn has(&self, hash: B256) -> bool {
        self.queue.lock().has(hash)
    }

    /// Register a peer as a block source, rejecting banned heads.
    pub fn register_peer(
        &self,
        id: impl Into<PeerId>,
        head: B256,
        client: Arc<dyn PeerClient>,
    ) -> Result<(), DownloadError> {
        let id = id.into();
        if self.banned.lock().contains(&head) {
            debug!(target: "downloader", peer = %id, "peer registration rejected, head hash banned");
            return Err(DownloadError::BannedHead);
        }
        trace!(target: "downloader", peer = %id, "registering peer");
        self.peers.register(Peer::new(id, head, client)).map_err(Into::into)
    }

    /// Remove a peer, preventing any further scheduling onto it.
    pub fn unregister_peer(&self, id: &str) -> Result<(), DownloadError> {
        trace!(target: "downloader", peer = %id, "unregistering peer");
        self.peers.unregister(id).map(drop).map_err(Into::into)
    }

    /// Synchronise against the given peer's advertised head. Synchronous:
    /// resolves when the hash chain and all block bodies are fetched, or
    /// with the first error.
    pub async fn synchronise(&self, id: &str, head: B256) -> Result<(), DownloadError> {
        // Only one sync at a time.
        if self.synchronising.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DownloadError::Busy);
        }
        let result = self.sync_to(id, head).await;
        self.synchronising.store(false, Ordering::SeqCst);
        result
    }

    async fn sync_to(&self, id: &str, head: B256) -> Result<(), DownloadError> {
        if self.banned.lock().contains(&head) {
            return Err(DownloadError::InvalidChain);
        }
        if self.notified.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
        {
            info!(target: "downloader", "block synchronisation started");
        }

        // Fresh delivery channels and cancel signal for this run.
        let (hash_tx, mut hash_rx) = mpsc::channel(1);
        let (block_tx, mut block_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        *self.conn.write() = SyncConn { hash_tx, block_tx, cancel: cancel.clone() };

        // Abort if the last batch was never drained by the consumer.
        {
            let queue = self.queue.lock();
            let (_, cached) = queue.size();
            if cached > 0 && queue.head_block().is_some() {
                return Err(DownloadError::PendingQueue);
            }
        }
        self.queue.lock().reset();
        self.peers.reset();
        self.checks.lock().clear();

        let Some(peer) = self.peers.peer(id) else { return Err(DownloadError::UnknownPeer) };

        let _ = self.events.send(SyncEvent::Started);
        debug!(target: "downloader", peer = %peer.id, "synchronising with the network");

        let result = {
            let fetch = async {
                self.fetch_hashes(&mut hash_rx, &mut block_rx, &cancel, peer, head).await?;
                self.fetch_blocks(&mut hash_rx, &mut block_rx, &cancel).await
            };
            fetch.await
        };
        match &result {
            Ok(()) => {
                debug!(target: "downloader", "synchronisation completed");
                let _ = self.events.send(SyncEvent::Done);
            }
            Err(err) => {
                self.cancel();
                let _ = self.events.send(SyncEvent::Failed(err.clone()));
            }
        }
        result
    }

    /// Inject a batch of hashes received from a remote peer.
    pub async fn deliver_hashes(&self, id: &str, hashes: Vec<B256>) -> Result<(), DownloadError> {
        if !self.synchronising() {
            return Err(DownloadError::NoSyncActive);
        }
        let (tx, cancel) = {
            let conn = self.conn.read();
            (conn.hash_tx.clone(), conn.cancel.clone())
        };
        tokio::select! {
            sent = tx.send(HashPack { peer_id: id.to_owned(), hashes }) => {
                sent.map_err(|_| DownloadError::NoSyncActive)
            }
            _ = cancel.cancelled() => Err(DownloadError::NoSyncActive),
        }
    }

    /// Inject a batch of blocks received from a remote peer.
    pub async fn deliver_blocks(
        &self,
        id: &str,
        blocks: Vec<Arc<SealedBlock>>,
    ) -> Result<(), DownloadError> {
        if !self.synchronising() {
            return Err(DownloadError::NoSyncActive);
        }
        let (tx, cancel) = {
            let conn = self.conn.read();
            (conn.block_tx.clone(), conn.cancel.clone())
        };
        tokio::select! {
            sent = tx.send(BlockPack { peer_id: id.to_owned(), blocks }) => {
                sent.map_err(|_| DownloadError::NoSyncActive)
            }
            _ = cancel.cancelled() => Err(DownloadError::NoSyncActive),
        }
    }

    /// Take the downloaded prefix from the queue for chain insertion,
    /// starting a fresh import measurement.
    pub fn take_blocks(&self) -> Vec<DownloadedBlock> {
        let blocks = self.queue.lock().take_blocks();
        if !blocks.is_empty() {
            let mut import = self.import.lock();
            import.start = Some(Instant::now());
            import.queue = blocks.iter().cloned().collect();
            import.done = 0;
        }
        blocks
    }

    /// Progress numbers: pending hashes, cached blocks, blocks being
    /// imported and a completion estimate.
    pub fn stats(&self) -> DownloaderStats {
        let (pending, cached) = self.queue.lock().size();

        let mut import = self.import.lock();
        while import
            .queue
            .front()
            .is_some_and(|block| self.chain.has_block(block.block.hash()))
        {
            import.queue.pop_front();
            import.done += 1;
        }
        let importing = import.queue.len();

        let estimate = match import.start {
            Some(start) if import.done > 0 => {
                start.elapsed() / import.done as u32 * (pending + cached + importing) as u32
            }
            _ => Duration::ZERO,
        };
        DownloaderStats { pending, cached, importing, estimate }
    }

    /// Cancel the running synchronisation and reset the queue and import
    /// statistics. Returns whether anything was active.
    pub fn cancel(&self) -> bool {
        {
            let queue = self.queue.lock();
            let (pending, cached) = queue.size();
            if !self.synchronising() && pending == 0 && cached == 0 {
                return false;
            }
        }
        self.conn.read().cancel.cancel();

        self.queue.lock().reset();
        self.checks.lock().clear();
        let mut import = self.import.lock();
        import.queue.clear();
        import.done = 0;
        import.start = None;
        true
    }

    /// Drive the hash chain fetch: request hashes from the active peer,
    /// cross-check random segments, rotate to another candidate peer on
    /// timeout, and stop at the first locally known hash.
    async fn fetch_hashes(
        &self,
        hash_rx: &mut mpsc::Receiver<HashPack>,
        block_rx: &mut mpsc::Receiver<BlockPack>,
        cancel: &CancellationToken,
        peer: Arc<Peer>,
        start_hash: B256,
    ) -> Result<(), DownloadError> {
        let started = Instant::now();
        let mut active = peer;
        let mut head = B256::ZERO;
        let mut attempted: HashSet<PeerId> = HashSet::new();
        attempted.insert(active.id.clone());

        debug!(target: "downloader", peer = %active.id, hash = %start_hash, "downloading hashes");

        let mut cross_ticker = time::interval_at(
            Instant::now() + self.config.cross_check_cycle,
            self.config.cross_check_cycle,
        );
        let timeout = time::sleep(self.config.hash_ttl);
        tokio::pin!(timeout);

        self.queue.lock().insert(&[start_hash]);
        self.request_hashes(&active, start_hash);
        timeout.as_mut().reset(Instant::now() + self.config.hash_ttl);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::CancelHashFetch),
                Some(pack) = hash_rx.recv() => FetchEvent::Hashes(pack),
                Some(pack) = block_rx.recv() => FetchEvent::Blocks(pack),
                _ = cross_ticker.tick() => FetchEvent::CrossTick,
                _ = &mut timeout => FetchEvent::Timeout,
            };

            match event {
                FetchEvent::Hashes(mut pack) => {
                    // Only the active peer feeds the hash chain.
                    if pack.peer_id != active.id {
                        debug!(target: "downloader", peer = %pack.peer_id, "received hashes from incorrect peer");
                        continue;
                    }
                    timeout.as_mut().reset(far_future());

                    if pack.hashes.is_empty() {
                        debug!(target: "downloader", peer = %active.id, "peer responded with empty hash set");
                        return Err(DownloadError::EmptyHashSet);
                    }
                    // Reject known-invalid chains outright, and blacklist a
                    // batch of the offender's blocks.
                    if let Some(index) =
                        pack.hashes.iter().position(|hash| self.banned.lock().contains(hash))
                    {
                        debug!(target: "downloader", peer = %active.id, "peer sent a known invalid chain");
                        self.queue.lock().insert(&pack.hashes[..=index]);
                        let banned_hash = pack.hashes[index];
                        let offender = active.id.clone();
                        if let Err(err) =
                            self.ban_blocks(hash_rx, block_rx, cancel, &offender, banned_hash).await
                        {
                            debug!(target: "downloader", %err, "failed to ban batch of blocks");
                        }
                        return Err(DownloadError::InvalidChain);
                    }

                    // Truncate at the first hash we already know.
                    let mut known_at = None;
                    for (index, hash) in pack.hashes.iter().enumerate() {
                        head = *hash;
                        if self.chain.has_block(*hash)
                            || self.queue.lock().get_block(*hash).is_some()
                        {
                            trace!(target: "downloader", %hash, "found common hash");
                            known_at = Some(index);
                            break;
                        }
                    }
                    let done = known_at.is_some();
                    if let Some(index) = known_at {
                        pack.hashes.truncate(index);
                    }

                    let inserts = self.queue.lock().insert(&pack.hashes);
                    if inserts.is_empty() && !done {
                        debug!(target: "downloader", peer = %active.id, "peer responded with stale hashes");
                        return Err(DownloadError::BadPeer);
                    }

                    if !done {
                        if inserts.len() < self.config.min_hash_fetch {
                            return Err(DownloadError::StallingPeer);
                        }
                        // Fetch a random block to verify the batch's linkage.
                        // The last hash is skipped as it races the next hash
                        // fetch; a single-hash batch has nothing to pair.
                        if inserts.len() >= 2 {
                            let cross = rand::thread_rng().gen_range(0..inserts.len() - 1);
                            let (origin, parent) = (inserts[cross], inserts[cross + 1]);
                            trace!(target: "downloader", peer = %active.id, %origin, %parent, "cross checking hash chain");
                            self.checks.lock().insert(
                                origin,
                                CrossCheck {
                                    expire: Instant::now() + self.config.block_soft_ttl,
                                    parent,
                                },
                            );
                            self.request_blocks(&active, &[origin]);
                        }
                        self.request_hashes(&active, head);
                        timeout.as_mut().reset(Instant::now() + self.config.hash_ttl);
                        continue;
                    }

                    // Common ancestor found; line the result cache up with it.
                    let offset =
                        self.chain.block_number(head).map(|number| number + 1).unwrap_or_default();
                    self.queue.lock().prepare(offset);
                    debug!(
                        target: "downloader",
                        hashes = self.queue.lock().pending(),
                        elapsed = ?started.elapsed(),
                        "downloaded hash chain"
                    );
                    return Ok(());
                }

                FetchEvent::Blocks(pack) => {
                    // Only single-block cross-check replies matter here.
                    if pack.peer_id != active.id || pack.blocks.len() != 1 {
                        continue;
                    }
                    let block = &pack.blocks[0];
                    let mut checks = self.checks.lock();
                    if let Some(check) = checks.get(&block.hash()) {
                        if block.parent_hash() != check.parent {
                            return Err(DownloadError::CrossCheckFailed);
                        }
                        checks.remove(&block.hash());
                    }
                }

                FetchEvent::CrossTick => {
                    let now = Instant::now();
                    for (hash, check) in self.checks.lock().iter() {
                        if now >= check.expire {
                            debug!(target: "downloader", %hash, "cross check timed out");
                            return Err(DownloadError::CrossCheckFailed);
                        }
                    }
                }

                FetchEvent::Timeout => {
                    debug!(target: "downloader", peer = %active.id, "peer did not respond in time to hash request");
                    // Rotate to a peer whose advertised head is already in
                    // the fetched chain and that has not been tried yet.
                    let candidate = self.peers.all_peers().into_iter().find(|candidate| {
                        self.queue.lock().has(candidate.head)
                            && !attempted.contains(&candidate.id)
                    });
                    let Some(next) = candidate else { return Err(DownloadError::Timeout) };
                    if head == B256::ZERO {
                        return Err(DownloadError::Timeout);
                    }

                    attempted.insert(next.id.clone());
                    active = next;
                    self.request_hashes(&active, head);
                    timeout.as_mut().reset(Instant::now() + self.config.hash_ttl);
                    debug!(target: "downloader", peer = %active.id, "hash fetching switched to new peer");
                }
            }
        }
    }

    /// Drive the block fetch: reserve chunks for idle peers on a fast tick,
    /// expire late reservations, and adjust peer reputation per delivery.
    async fn fetch_blocks(
        &self,
        hash_rx: &mut mpsc::Receiver<HashPack>,
        block_rx: &mut mpsc::Receiver<BlockPack>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        debug!(target: "downloader", blocks = self.queue.lock().pending(), "downloading blocks");
        let started = Instant::now();
        let mut ticker = time::interval(self.config.fetch_tick);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::CancelBlockFetch),

                Some(_) = hash_rx.recv() => {
                    // Out of bounds hashes received, ignore them.
                }

                Some(pack) = block_rx.recv() => {
                    // Drop stale single-block cross checks.
                    if pack.blocks.len() == 1
                        && self.checks.lock().remove(&pack.blocks[0].hash()).is_some()
                    {
                        continue;
                    }
                    let Some(peer) = self.peers.peer(&pack.peer_id) else { continue };
                    match self.queue.lock().deliver(&pack.peer_id, pack.blocks) {
                        Ok(0) => {
                            peer.demote();
                            peer.set_idle();
                            trace!(target: "downloader", peer = %peer.id, "no blocks delivered");
                        }
                        Ok(count) => {
                            peer.promote();
                            peer.set_idle();
                            trace!(target: "downloader", peer = %peer.id, count, "delivered blocks");
                        }
                        Err(DownloadError::InvalidChain) => {
                            // Blocks are not ordered properly, abort.
                            return Err(DownloadError::InvalidChain);
                        }
                        Err(DownloadError::NoFetchesPending) => {
                            // The peer timed out earlier but came through in
                            // the end; usable again.
                            peer.demote();
                            peer.set_idle();
                            trace!(target: "downloader", peer = %peer.id, "out of bound delivery");
                        }
                        Err(DownloadError::StaleDelivery) => {
                            // Delivery from a previous cycle; the current
                            // reservation is still in flight, keep it.
                            peer.demote();
                            trace!(target: "downloader", peer = %peer.id, "stale delivery");
                        }
                        Err(err) => {
                            peer.demote();
                            peer.set_idle();
                            trace!(target: "downloader", peer = %peer.id, %err, "delivery partially failed");
                        }
                    }
                }

                _ = ticker.tick() => {
                    if self.peers.len() == 0 {
                        return Err(DownloadError::NoPeers);
                    }
                    // Expire late reservations and demote the culprits.
                    for peer_id in self.queue.lock().expire(self.config.block_hard_ttl) {
                        if let Some(peer) = self.peers.peer(&peer_id) {
                            peer.demote();
                            trace!(target: "downloader", peer = %peer_id, "block delivery timeout");
                        }
                    }

                    if self.queue.lock().pending() > 0 {
                        // Hold off while the result cache waits for draining.
                        if self.queue.lock().throttle() {
                            continue;
                        }
                        for peer in self.peers.idle_peers() {
                            if self.queue.lock().throttle() {
                                break;
                            }
                            let Some(request) =
                                self.queue.lock().reserve(&peer.id, peer.capacity())
                            else {
                                continue;
                            };
                            trace!(target: "downloader", peer = %peer.id, count = request.len(), "requesting blocks");
                            if peer.fetch(&request).is_err() {
                                error!(target: "downloader", peer = %peer.id, "peer received double work");
                                self.queue.lock().cancel(&request);
                            }
                        }
                        if self.queue.lock().in_flight() == 0 {
                            return Err(DownloadError::PeersUnavailable);
                        }
                    } else if self.queue.lock().in_flight() == 0 {
                        debug!(target: "downloader", elapsed = ?started.elapsed(), "downloaded blocks");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Fetch one batch of blocks from a peer feeding us invalid hashes and
    /// ban the tip of the linked segment rooted at `head`.
    ///
    /// Only a single batch is fetched: the goal is not to chase a whole
    /// invalid chain, but to grow the blacklist if the peer keeps
    /// reconnecting.
    async fn ban_blocks(
        &self,
        hash_rx: &mut mpsc::Receiver<HashPack>,
        block_rx: &mut mpsc::Receiver<BlockPack>,
        cancel: &CancellationToken,
        peer_id: &str,
        head: B256,
    ) -> Result<(), DownloadError> {
        debug!(target: "downloader", peer = %peer_id, "banning a batch of blocks");
        let Some(peer) = self.peers.peer(peer_id) else { return Ok(()) };
        let Some(request) = self.queue.lock().reserve(peer_id, self.config.max_block_fetch)
        else {
            return Ok(());
        };
        peer.fetch(&request)?;

        let deadline = time::sleep(self.config.block_hard_ttl);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::CancelBlockFetch),
                _ = &mut deadline => return Err(DownloadError::Timeout),

                Some(_) = hash_rx.recv() => {
                    // Out of bounds hashes received, ignore them.
                }

                Some(pack) = block_rx.recv() => {
                    // Drop stale single-block cross checks.
                    if pack.blocks.len() == 1
                        && self.checks.lock().remove(&pack.blocks[0].hash()).is_some()
                    {
                        continue;
                    }
                    if pack.peer_id != peer_id {
                        continue;
                    }
                    if pack.blocks.is_empty() {
                        return Err(DownloadError::NoBlocksToBan);
                    }
                    // Reconstruct the chain order and walk the linked
                    // segment rooted at the banned head.
                    let mut blocks = pack.blocks;
                    blocks.sort_by_key(|block| block.number());
                    if blocks[0].hash() != head {
                        return Err(DownloadError::BanHeadMismatch);
                    }
                    let mut index = 0;
                    while index + 1 < blocks.len()
                        && blocks[index + 1].parent_hash() == blocks[index].hash()
                    {
                        index += 1;
                    }

                    self.banned.lock().insert(blocks[index].hash());
                    debug!(target: "downloader", blocks = index + 1, peer = %peer_id, "banned blocks");
                    return Ok(());
                }
            }
        }
    }

    fn request_hashes(&self, peer: &Peer, from: B256) {
        if let Err(err) = peer.get_hashes(from) {
            debug!(target: "downloader", peer = %peer.id, %err, "failed to request hashes");
        }
    }

    fn request_blocks(&self, peer: &Peer, hashes: &[B256]) {
        if let Err(err) = peer.get_blocks(hashes) {
            debug!(target: "downloader", peer = %peer.id, %err, "failed to request blocks");
        }
    }
}

impl<C: LocalChain> std::fmt::Debug for Downloader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("synchronising", &self.synchronising())
            .field("peers", &self.peers.len())
            .finish_non_exhaustive()
    }
}

impl From<PeerError> for DownloadError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::AlreadyRegistered => Self::AlreadyRegistered,
            PeerError::NotRegistered => Self::NotRegistered,
        }
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}
