use crate::{error::DownloadError, peer::PeerId};
use ember_primitives::{BlockNumber, SealedBlock, B256};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;

/// A block fetched from a remote peer, tagged with its origin.
#[derive(Debug, Clone)]
pub struct DownloadedBlock {
    /// The fetched block.
    pub block: Arc<SealedBlock>,
    /// Id of the peer that delivered it.
    pub origin: PeerId,
}

/// A chunk of hashes reserved for one peer.
#[derive(Debug, Clone)]
pub struct Request {
    /// The peer the chunk is reserved for.
    pub peer_id: PeerId,
    /// Reserved hashes and their scheduling index.
    hashes: HashMap<B256, u64>,
    /// When the reservation was made.
    pub time: Instant,
}

impl Request {
    /// The reserved hashes.
    pub fn hashes(&self) -> Vec<B256> {
        self.hashes.keys().copied().collect()
    }

    /// Number of reserved hashes.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Whether the reservation is empty.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Scheduler from pending hashes to delivered blocks.
///
/// Hashes keep their insertion index for their whole life in the queue, so
/// reservations that expire or get cancelled return to the pending set in
/// the original order. Delivered blocks land in a fixed result cache whose
/// first slot is the block at `offset`, letting the consumer drain a ready
/// prefix in chain order.
#[derive(Debug)]
pub struct DownloadQueue {
    /// Next scheduling index.
    counter: u64,
    /// Scheduling index of every hash not yet delivered.
    hash_pool: HashMap<B256, u64>,
    /// Schedulable hashes by insertion index.
    pending: BTreeMap<u64, B256>,
    /// Active reservations by peer.
    reservations: HashMap<PeerId, Request>,
    /// Height of every delivered block.
    block_pool: HashMap<B256, BlockNumber>,
    /// Result cache; slot `i` holds the block at height `offset + i`.
    cache: VecDeque<Option<DownloadedBlock>>,
    /// Height of the first cache slot.
    offset: u64,
    limit: usize,
}

impl DownloadQueue {
    /// An empty queue with the given result-cache capacity.
    pub fn new(limit: usize) -> Self {
        Self {
            counter: 0,
            hash_pool: HashMap::new(),
            pending: BTreeMap::new(),
            reservations: HashMap::new(),
            block_pool: HashMap::new(),
            cache: std::iter::repeat_with(|| None).take(limit).collect(),
            offset: 0,
            limit,
        }
    }

    /// Clear all scheduled and delivered state.
    pub fn reset(&mut self) {
        self.counter = 0;
        self.hash_pool.clear();
        self.pending.clear();
        self.reservations.clear();
        self.block_pool.clear();
        self.cache = std::iter::repeat_with(|| None).take(self.limit).collect();
        self.offset = 0;
    }

    /// Whether the queue knows the hash, pending or delivered.
    pub fn has(&self, hash: B256) -> bool {
        self.hash_pool.contains_key(&hash) || self.block_pool.contains_key(&hash)
    }

    /// Number of hashes available for reservation.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of active reservations.
    pub fn in_flight(&self) -> usize {
        self.reservations.len()
    }

    /// Scheduled-but-undelivered and delivered counts.
    pub fn size(&self) -> (usize, usize) {
        (self.hash_pool.len(), self.block_pool.len())
    }

    /// Append unknown hashes to the pending set in order, returning the
    /// newly added subset.
    pub fn insert(&mut self, hashes: &[B256]) -> Vec<B256> {
        let mut inserted = Vec::new();
        for &hash in hashes {
            if self.has(hash) {
                continue;
            }
            let index = self.counter;
            self.counter += 1;
            self.hash_pool.insert(hash, index);
            self.pending.insert(index, hash);
            inserted.push(hash);
        }
        inserted
    }

    /// Line the result cache up so that its first slot is height `offset`
    /// (the common ancestor plus one).
    pub fn prepare(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// The delivered block with the given hash, if cached.
    pub fn get_block(&self, hash: B256) -> Option<DownloadedBlock> {
        let number = *self.block_pool.get(&hash)?;
        let index = number.checked_sub(self.offset)? as usize;
        self.cache.get(index)?.clone()
    }

    /// The delivered block occupying the first cache slot, if any.
    pub fn head_block(&self) -> Option<DownloadedBlock> {
        self.cache.front()?.clone()
    }

    /// Whether the result cache has no room for more in-flight work.
    pub fn throttle(&self) -> bool {
        self.in_flight_hashes() >= self.limit.saturating_sub(self.block_pool.len())
    }

    fn in_flight_hashes(&self) -> usize {
        self.reservations.values().map(Request::len).sum()
    }

    /// Atomically hand up to `max` pending hashes to `peer_id`.
    ///
    /// Returns `None` if nothing is schedulable, the peer already holds a
    /// reservation, or the result cache has no room.
    pub fn reserve(&mut self, peer_id: &str, max: usize) -> Option<Request> {
        if self.pending.is_empty() || max == 0 {
            return None;
        }
        if self.reservations.contains_key(peer_id) {
            return None;
        }
        let space = self
            .limit
            .saturating_sub(self.block_pool.len())
            .saturating_sub(self.in_flight_hashes());
        let take = space.min(max);
        if take == 0 {
            return None;
        }

        let mut hashes = HashMap::new();
        while hashes.len() < take {
            let Some((&index, &hash)) = self.pending.iter().next() else { break };
            self.pending.remove(&index);
            hashes.insert(hash, index);
        }

        let request = Request { peer_id: peer_id.to_owned(), hashes, time: Instant::now() };
        self.reservations.insert(peer_id.to_owned(), request.clone());
        Some(request)
    }

    /// Match a delivery against the peer's reservation, filling the result
    /// cache. Returns the number of accepted blocks; undelivered hashes
    /// return to the pending set.
    pub fn deliver(
        &mut self,
        peer_id: &str,
        blocks: Vec<Arc<SealedBlock>>,
    ) -> Result<usize, DownloadError> {
        let Some(mut request) = self.reservations.remove(peer_id) else {
            return Err(DownloadError::NoFetchesPending);
        };

        let total = blocks.len();
        let mut accepted = 0usize;
        let mut unrequested = 0usize;
        for block in blocks {
            let hash = block.hash();
            let number = block.number();
            if request.hashes.remove(&hash).is_none() {
                unrequested += 1;
                continue;
            }
            // The block must land inside the prepared cache window.
            let index = match number.checked_sub(self.offset).map(|i| i as usize) {
                Some(index) if index < self.limit => index,
                _ => {
                    self.requeue(request);
                    return Err(DownloadError::InvalidChain);
                }
            };
            self.cache[index] = Some(DownloadedBlock { block, origin: peer_id.to_owned() });
            self.hash_pool.remove(&hash);
            self.block_pool.insert(hash, number);
            accepted += 1;
        }
        self.requeue(request);

        if unrequested > 0 {
            if accepted == 0 {
                return Err(DownloadError::StaleDelivery);
            }
            return Err(DownloadError::PartialDelivery { failed: unrequested, total });
        }
        Ok(accepted)
    }

    /// Release reservations older than `timeout`, returning the offending
    /// peers. Their hashes return to the pending set.
    pub fn expire(&mut self, timeout: Duration) -> Vec<PeerId> {
        let now = Instant::now();
        let expired: Vec<PeerId> = self
            .reservations
            .iter()
            .filter(|(_, request)| now.saturating_duration_since(request.time) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(request) = self.reservations.remove(id) {
                self.requeue(request);
            }
        }
        expired
    }

    /// Return a reservation's hashes to the pending set.
    pub fn cancel(&mut self, request: &Request) {
        if let Some(request) = self.reservations.remove(&request.peer_id) {
            self.requeue(request);
        }
    }

    /// Drain the ready prefix of the result cache in chain order.
    pub fn take_blocks(&mut self) -> Vec<DownloadedBlock> {
        let mut blocks = Vec::new();
        while matches!(self.cache.front(), Some(Some(_))) {
            let block = self.cache.pop_front().flatten().expect("slot is filled");
            self.cache.push_back(None);
            self.block_pool.remove(&block.block.hash());
            self.offset += 1;
            blocks.push(block);
        }
        blocks
    }

    fn requeue(&mut self, request: Request) {
        for (hash, index) in request.hashes {
            self.pending.insert(index, hash);
        }
    }
}
