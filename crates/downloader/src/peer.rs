use crate::{config::MAX_BLOCK_FETCH, queue::Request};
use ember_interfaces::p2p::{PeerClient, RequestError, RequestResult};
use ember_primitives::B256;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

/// Identifier of a registered peer.
pub type PeerId = String;

/// Errors from peer registry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    /// The peer is already registered.
    #[error("peer is already registered")]
    AlreadyRegistered,
    /// The peer is not registered.
    #[error("peer is not registered")]
    NotRegistered,
}

/// A registered download peer and its reputation state.
///
/// A peer starts with a capacity of one block per request and earns more by
/// delivering; failed or late deliveries halve the capacity back towards the
/// floor of one.
pub struct Peer {
    /// Unique identifier of the peer.
    pub id: PeerId,
    /// The peer's advertised head hash.
    pub head: B256,
    client: Arc<dyn PeerClient>,
    idle: AtomicBool,
    capacity: AtomicUsize,
}

impl Peer {
    /// Track a new peer with the given transport handle.
    pub fn new(id: impl Into<PeerId>, head: B256, client: Arc<dyn PeerClient>) -> Self {
        Self {
            id: id.into(),
            head,
            client,
            idle: AtomicBool::new(true),
            capacity: AtomicUsize::new(1),
        }
    }

    /// Number of blocks the peer is currently trusted with per request.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Whether the peer is available for a new fetch.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    /// Mark the peer available for a new fetch.
    pub fn set_idle(&self) {
        self.idle.store(true, Ordering::Release);
    }

    /// Reward a delivery by raising the peer's capacity.
    pub fn promote(&self) {
        let _ = self.capacity.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cap| {
            Some((cap + 1).min(MAX_BLOCK_FETCH))
        });
    }

    /// Punish a failed or late delivery by halving the peer's capacity.
    pub fn demote(&self) {
        let _ = self.capacity.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cap| {
            Some((cap / 2).max(1))
        });
    }

    /// Reset reputation state between synchronisations.
    pub fn reset(&self) {
        self.idle.store(true, Ordering::Release);
        self.capacity.store(1, Ordering::Release);
    }

    /// Dispatch a reserved chunk of block hashes to the peer.
    ///
    /// Fails with [`RequestError::Busy`] if the peer is already serving a
    /// request; the idle flag is cleared until
    /// [`set_idle`](Self::set_idle).
    pub fn fetch(&self, request: &Request) -> RequestResult<()> {
        if self.idle.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(RequestError::Busy);
        }
        self.client.get_blocks(&request.hashes())
    }

    /// Request a hash chain walking backwards from `from`.
    pub fn get_hashes(&self, from: B256) -> RequestResult<()> {
        self.client.get_hashes(from)
    }

    /// Request individual blocks outside a reservation (cross-checks).
    pub fn get_blocks(&self, hashes: &[B256]) -> RequestResult<()> {
        self.client.get_blocks(hashes)
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("head", &self.head)
            .field("idle", &self.is_idle())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// The set of registered peers.
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: RwLock<HashMap<PeerId, Arc<Peer>>>,
}

impl PeerSet {
    /// An empty peer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new peer.
    pub fn register(&self, peer: Peer) -> Result<(), PeerError> {
        let mut peers = self.peers.write();
        if peers.contains_key(&peer.id) {
            return Err(PeerError::AlreadyRegistered);
        }
        peers.insert(peer.id.clone(), Arc::new(peer));
        Ok(())
    }

    /// Remove a peer, preventing any further scheduling onto it.
    pub fn unregister(&self, id: &str) -> Result<Arc<Peer>, PeerError> {
        self.peers.write().remove(id).ok_or(PeerError::NotRegistered)
    }

    /// The peer with the given id, if registered.
    pub fn peer(&self, id: &str) -> Option<Arc<Peer>> {
        self.peers.read().get(id).cloned()
    }

    /// All registered peers.
    pub fn all_peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().cloned().collect()
    }

    /// All peers currently available for a fetch.
    pub fn idle_peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().filter(|peer| peer.is_idle()).cloned().collect()
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether no peers are registered.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Reset the reputation state of every peer.
    pub fn reset(&self) {
        for peer in self.peers.read().values() {
            peer.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_interfaces::test_utils::random_hash;

    /// A transport stub that accepts everything.
    #[derive(Debug, Default)]
    struct NullClient;

    impl PeerClient for NullClient {
        fn get_hashes(&self, _from: B256) -> RequestResult<()> {
            Ok(())
        }

        fn get_blocks(&self, _hashes: &[B256]) -> RequestResult<()> {
            Ok(())
        }
    }

    fn peer(id: &str) -> Peer {
        Peer::new(id, random_hash(), Arc::new(NullClient))
    }

    #[test]
    fn capacity_grows_and_halves_with_floor() {
        let peer = peer("a");
        assert_eq!(peer.capacity(), 1);

        for _ in 0..4 {
            peer.promote();
        }
        assert_eq!(peer.capacity(), 5);

        peer.demote();
        assert_eq!(peer.capacity(), 2);
        peer.demote();
        peer.demote();
        assert_eq!(peer.capacity(), 1);

        for _ in 0..1000 {
            peer.promote();
        }
        assert_eq!(peer.capacity(), MAX_BLOCK_FETCH);
    }

    #[test]
    fn fetch_rejects_double_work() {
        let set = PeerSet::new();
        set.register(peer("a")).unwrap();
        let peer = set.peer("a").unwrap();

        let request = {
            let mut queue = crate::queue::DownloadQueue::new(16);
            queue.insert(&[random_hash(), random_hash()]);
            queue.reserve("a", 2).unwrap()
        };
        assert!(peer.fetch(&request).is_ok());
        assert!(!peer.is_idle());
        assert_eq!(peer.fetch(&request), Err(RequestError::Busy));

        peer.set_idle();
        assert!(peer.fetch(&request).is_ok());
    }

    #[test]
    fn registry_rejects_duplicates_and_unknowns() {
        let set = PeerSet::new();
        set.register(peer("a")).unwrap();
        assert_eq!(set.register(peer("a")), Err(PeerError::AlreadyRegistered));
        assert_eq!(set.len(), 1);

        assert!(set.peer("b").is_none());
        assert_matches::assert_matches!(set.unregister("b"), Err(PeerError::NotRegistered));
        assert!(set.unregister("a").is_ok());
        assert!(set.is_empty());
    }

    #[test]
    fn idle_tracking_and_reset() {
        let set = PeerSet::new();
        set.register(peer("a")).unwrap();
        set.register(peer("b")).unwrap();

        let a = set.peer("a").unwrap();
        a.promote();
        let request = {
            let mut queue = crate::queue::DownloadQueue::new(16);
            queue.insert(&[random_hash()]);
            queue.reserve("a", 1).unwrap()
        };
        a.fetch(&request).unwrap();

        assert_eq!(set.idle_peers().len(), 1);
        assert_eq!(set.idle_peers()[0].id, "b");

        set.reset();
        assert_eq!(set.idle_peers().len(), 2);
        assert_eq!(a.capacity(), 1);
    }
}
