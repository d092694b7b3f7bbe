use crate::{
    cache::BlockCache,
    config::ChainConfig,
    error::{ChainError, ExportError, InsertError},
    events::{ChainEvent, ChainHeadEvent, ChainNotification, ChainSideEvent, ChainSplitEvent},
    nonce::verify_nonces,
    rules::{calc_difficulty, calc_gas_limit, calc_td},
    store::BlockStore,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use ember_interfaces::{
    chain::LocalChain,
    db::KeyValueStore,
    pow::PowVerifier,
    processor::{BlockProcessor, ProcessorError},
};
use ember_primitives::{Block, BlockHash, BlockNumber, Header, SealedBlock, B256, B64, U256};
use parking_lot::{Mutex, RwLock};
use std::{
    fmt,
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Instant, SystemTime, UNIX_EPOCH},
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};

/// Capacity of the notification channel handed to subscribers.
const NOTIFICATION_CAPACITY: usize = 1024;

/// The canonical head and its accounting, guarded as one unit.
struct HeadState {
    current: Arc<SealedBlock>,
    td: U256,
    last_hash: BlockHash,
}

/// Per-batch import counters.
#[derive(Debug, Default)]
struct ImportStats {
    processed: usize,
    queued: usize,
    ignored: usize,
}

/// Maintains the canonical chain: validates incoming blocks, persists them,
/// keeps total-difficulty accounting and reorganises across forks.
///
/// All imports flow through [`insert_chain`](Self::insert_chain), which is
/// serialized by an import lock; readers only take short read locks on the
/// head snapshot. A background worker dispatches queued notifications and
/// periodically re-submits parked future blocks.
pub struct ChainManager<DB> {
    store: BlockStore<DB>,
    pow: Arc<dyn PowVerifier>,
    processor: RwLock<Option<Arc<dyn BlockProcessor>>>,
    config: ChainConfig,

    genesis: RwLock<Arc<SealedBlock>>,
    /// Head snapshot.
    head: RwLock<HeadState>,
    /// Serializes whole `insert_chain` calls.
    import_lock: Mutex<()>,
    /// Root of the transient state view tracking the head.
    transient_root: RwLock<B256>,

    /// Recent canonical window.
    cache: Mutex<BlockCache>,
    /// Blocks ahead of the wall clock, waiting to become current.
    future_blocks: Mutex<BlockCache>,

    notifications: broadcast::Sender<ChainNotification>,
    batch_tx: Sender<Vec<ChainNotification>>,
    quit_tx: Sender<()>,
    /// Interrupt flag observed between blocks of an import.
    interrupt: AtomicBool,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<DB> fmt::Debug for ChainManager<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.head.read();
        f.debug_struct("ChainManager")
            .field("head", &head.last_hash)
            .field("td", &head.td)
            .finish_non_exhaustive()
    }
}

impl<DB: KeyValueStore + Send + Sync + 'static> ChainManager<DB> {
    /// Create a chain manager over the given database.
    ///
    /// Loads the persisted head, or installs `genesis` on a fresh database.
    /// Refuses to start if the database holds a different genesis, and
    /// rewinds the head across any configured bad hash found in the local
    /// chain before starting the background worker.
    pub fn new(
        genesis: SealedBlock,
        db: DB,
        pow: Arc<dyn PowVerifier>,
        config: ChainConfig,
    ) -> Result<Arc<Self>, ChainError> {
        let store = BlockStore::new(db);
        if let Some((stored, _)) = store.block_by_number(0)? {
            if stored.hash() != genesis.hash() {
                return Err(ChainError::GenesisMismatch {
                    stored: stored.hash(),
                    configured: genesis.hash(),
                });
            }
        }

        let genesis = Arc::new(genesis);
        let (batch_tx, batch_rx) = unbounded();
        let (quit_tx, quit_rx) = bounded(1);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let this = Arc::new(Self {
            store,
            pow,
            processor: RwLock::new(None),
            genesis: RwLock::new(genesis.clone()),
            head: RwLock::new(HeadState {
                current: genesis.clone(),
                td: genesis.header().difficulty,
                last_hash: genesis.hash(),
            }),
            import_lock: Mutex::new(()),
            transient_root: RwLock::new(genesis.header().state_root),
            cache: Mutex::new(BlockCache::new(config.block_cache_limit)),
            future_blocks: Mutex::new(BlockCache::new(config.max_future_blocks)),
            notifications,
            batch_tx,
            quit_tx,
            interrupt: AtomicBool::new(false),
            worker: Mutex::new(None),
            config,
        });

        this.load_last_state()?;

        for hash in this.config.bad_hashes.iter().copied().collect::<Vec<_>>() {
            if let Some(block) = this.get_block(hash) {
                error!(target: "chain", %hash, "found bad hash, rewinding chain to its parent");
                let parent = this
                    .get_block(block.parent_hash())
                    .ok_or(ChainError::MissingParent(block.parent_hash()))?;
                this.set_head(parent)?;
                info!(target: "chain", "chain rewind successful, resuming normal operation");
            }
        }

        this.rebuild_cache();

        let worker = {
            let this = this.clone();
            thread::spawn(move || this.update_loop(batch_rx, quit_rx))
        };
        *this.worker.lock() = Some(worker);

        Ok(this)
    }

    /// Install the block processor consulted during imports.
    pub fn set_processor(&self, processor: Arc<dyn BlockProcessor>) {
        *self.processor.write() = Some(processor);
    }

    /// Subscribe to chain notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainNotification> {
        self.notifications.subscribe()
    }

    /// The current head block.
    pub fn current_block(&self) -> Arc<SealedBlock> {
        self.head.read().current.clone()
    }

    /// Total difficulty of the canonical chain.
    pub fn td(&self) -> U256 {
        self.head.read().td
    }

    /// Gas limit of the current head block.
    pub fn gas_limit(&self) -> U256 {
        self.head.read().current.header().gas_limit
    }

    /// Hash of the persisted head pointer.
    pub fn last_block_hash(&self) -> BlockHash {
        self.head.read().last_hash
    }

    /// The configured genesis block.
    pub fn genesis(&self) -> Arc<SealedBlock> {
        self.genesis.read().clone()
    }

    /// Total difficulty, head hash and genesis hash in one snapshot.
    pub fn status(&self) -> (U256, BlockHash, BlockHash) {
        let head = self.head.read();
        (head.td, head.current.hash(), self.genesis.read().hash())
    }

    /// Root of the transient state view.
    pub fn transient_root(&self) -> B256 {
        *self.transient_root.read()
    }

    /// Whether the block with the given hash is stored.
    pub fn has_block(&self, hash: BlockHash) -> bool {
        if self.cache.lock().has(&hash) {
            return true;
        }
        self.store.has_block(hash).unwrap_or_else(|err| {
            error!(target: "chain", %hash, %err, "failed to probe block");
            false
        })
    }

    /// The stored block with the given hash, if any.
    pub fn get_block(&self, hash: BlockHash) -> Option<Arc<SealedBlock>> {
        match self.store.block_by_hash(hash) {
            Ok(block) => block.map(|(block, _)| Arc::new(block)),
            Err(err) => {
                error!(target: "chain", %hash, %err, "failed to read block");
                None
            }
        }
    }

    /// The canonical block at the given height, if any.
    pub fn get_block_by_number(&self, number: BlockNumber) -> Option<Arc<SealedBlock>> {
        match self.store.block_by_number(number) {
            Ok(block) => block.map(|(block, _)| Arc::new(block)),
            Err(err) => {
                error!(target: "chain", number, %err, "failed to read block");
                None
            }
        }
    }

    /// Hashes of up to `max` ancestors of the given block, child first,
    /// stopping at the genesis block.
    pub fn get_block_hashes_from(&self, hash: BlockHash, max: usize) -> Vec<BlockHash> {
        let Some(mut block) = self.get_block(hash) else { return Vec::new() };
        let mut chain = Vec::new();
        for _ in 0..max {
            match self.get_block(block.parent_hash()) {
                Some(parent) => {
                    chain.push(parent.hash());
                    block = parent;
                }
                None => break,
            }
            if block.number() == 0 {
                break;
            }
        }
        chain
    }

    /// Up to `length` ancestors of the given block, child first.
    pub fn get_ancestors(&self, block: &SealedBlock, length: usize) -> Vec<Arc<SealedBlock>> {
        let mut blocks = Vec::new();
        let mut hash = block.parent_hash();
        for _ in 0..length {
            match self.get_block(hash) {
                Some(parent) => {
                    hash = parent.parent_hash();
                    blocks.push(parent);
                }
                None => break,
            }
        }
        blocks
    }

    /// Uncle headers carried by the given block and `length - 1` of its
    /// ancestors.
    pub fn get_uncles_in_chain(&self, block: Arc<SealedBlock>, length: usize) -> Vec<Header> {
        let mut uncles = Vec::new();
        let mut cursor = Some(block);
        for _ in 0..length {
            let Some(block) = cursor else { break };
            uncles.extend(block.uncles.iter().cloned());
            cursor = self.get_block(block.parent_hash());
        }
        uncles
    }

    /// Total difficulty of a block recomputed from its parent, including the
    /// difficulty of its uncles.
    pub fn calc_total_diff(&self, block: &SealedBlock) -> Result<U256, ChainError> {
        let (_, parent_td) = self
            .store
            .block_by_hash(block.parent_hash())?
            .ok_or(ChainError::MissingParent(block.parent_hash()))?;
        let uncle_diff =
            block.uncles.iter().fold(U256::ZERO, |acc, uncle| acc + uncle.difficulty);
        Ok(parent_td + uncle_diff + block.header().difficulty)
    }

    /// An empty block template on top of the current head, with difficulty
    /// and gas limit derived from the adjustment rules.
    pub fn new_block(&self, time: u64) -> Block {
        let parent = self.current_block();
        Block {
            header: Header {
                parent_hash: parent.hash(),
                number: parent.number() + 1,
                time,
                difficulty: calc_difficulty(time, parent.header()),
                gas_limit: calc_gas_limit(parent.header()),
                gas_used: U256::ZERO,
                nonce: B64::ZERO,
                state_root: parent.header().state_root,
            },
            ..Default::default()
        }
    }

    /// Rewind the canonical chain onto `new_head`, purging on-disk blocks
    /// above it and rebuilding the cache, total difficulty and state view.
    pub fn set_head(&self, new_head: Arc<SealedBlock>) -> Result<(), ChainError> {
        {
            let mut head = self.head.write();
            let mut cursor = Some(head.current.clone());
            while let Some(block) = cursor {
                if block.hash() == new_head.hash() {
                    break;
                }
                self.store.delete_block(block.hash())?;
                cursor = self.store.block_by_hash(block.parent_hash())?.map(|(b, _)| Arc::new(b));
            }

            let td = self
                .store
                .block_by_hash(new_head.hash())?
                .map(|(_, td)| td)
                .ok_or(ChainError::MissingHead(new_head.hash()))?;
            self.store.set_canonical(new_head.number(), new_head.hash())?;
            self.store.set_last(new_head.hash())?;
            head.current = new_head.clone();
            head.td = td;
            head.last_hash = new_head.hash();
        }
        *self.transient_root.write() = new_head.header().state_root;
        self.rebuild_cache();
        Ok(())
    }

    /// Wipe the chain and reinstall the configured genesis.
    pub fn reset(&self) -> Result<(), ChainError> {
        let genesis = self.genesis.read().clone();
        self.reset_to(genesis)
    }

    /// Wipe the chain and install a new genesis block.
    pub fn reset_with_genesis(&self, genesis: SealedBlock) -> Result<(), ChainError> {
        let genesis = Arc::new(genesis);
        *self.genesis.write() = genesis.clone();
        self.reset_to(genesis)
    }

    /// Write the whole canonical chain to `w` in canonical encoding.
    pub fn export<W: Write>(&self, w: &mut W) -> Result<(), ExportError> {
        let last = self.current_block().number();
        self.export_range(w, 0, last)
    }

    /// Write canonical blocks `[first..=last]` to `w` in order.
    pub fn export_range<W: Write>(
        &self,
        w: &mut W,
        first: BlockNumber,
        last: BlockNumber,
    ) -> Result<(), ExportError> {
        if first > last {
            return Err(ExportError::InvalidRange { first, last });
        }
        info!(target: "chain", blocks = last - first + 1, "exporting blocks");

        for number in first..=last {
            let (block, _) =
                self.store.block_by_number(number)?.ok_or(ExportError::MissingBlock(number))?;
            w.write_all(&alloy_rlp::encode(block.unseal()))?;
        }
        Ok(())
    }

    /// Import an ordered batch of blocks into the canonical chain, or store
    /// them as a fork.
    ///
    /// On failure, [`InsertError::index`] points at the first failing block;
    /// blocks before it stay imported. Proof-of-work nonces are verified by
    /// a parallel pool while the batch is processed in order.
    pub fn insert_chain(&self, chain: Vec<Arc<SealedBlock>>) -> Result<(), InsertError> {
        if chain.is_empty() {
            return Ok(());
        }
        let _import = self.import_lock.lock();

        let processor = self
            .processor
            .read()
            .clone()
            .ok_or(InsertError::new(0, ChainError::ProcessorUnset))?;

        let blocks = Arc::new(chain);
        let (done_tx, done_rx) = bounded(blocks.len());
        let (nonce_quit_tx, nonce_quit_rx) = bounded::<()>(0);
        {
            let pow = self.pow.clone();
            let blocks = blocks.clone();
            let _ = thread::spawn(move || verify_nonces(pow, blocks, nonce_quit_rx, done_tx));
        }
        // Dropped on every return path, unblocking the verifier feeder.
        let _nonce_quit = nonce_quit_tx;

        let mut events = Vec::new();
        let mut nonce_checked = vec![false; blocks.len()];
        let mut nonce_valid = vec![false; blocks.len()];
        let mut stats = ImportStats::default();
        let mut tx_count = 0usize;
        let started = Instant::now();

        'import: for (i, block) in blocks.iter().enumerate() {
            if self.interrupt.load(Ordering::SeqCst) {
                debug!(target: "chain", "premature abort during block import");
                break;
            }

            // Verdicts arrive in completion order; buffer until this block's
            // is in.
            while !nonce_checked[i] {
                match done_rx.recv() {
                    Ok(result) => {
                        nonce_checked[result.index] = true;
                        nonce_valid[result.index] = result.valid;
                    }
                    Err(_) => break 'import,
                }
            }
            if !nonce_valid[i] {
                return Err(InsertError::new(
                    i,
                    ChainError::BlockNonce {
                        hash: block.hash(),
                        number: block.number(),
                        nonce: block.header().nonce,
                    },
                ));
            }

            if self.config.bad_hashes.contains(&block.hash()) {
                block_err(block, &"known bad hash");
                return Err(InsertError::new(i, ChainError::BadHash(block.hash())));
            }

            // Stamp the total difficulty up front so side chains and known
            // blocks carry a usable value downstream.
            let parent_td = match self.store.block_by_hash(block.parent_hash()) {
                Ok(parent) => parent.map(|(_, td)| td),
                Err(err) => return Err(InsertError::new(i, err.into())),
            };
            let td = calc_td(block.header().difficulty, parent_td);

            let logs = match processor.process(block) {
                Ok(logs) => logs,
                Err(ProcessorError::KnownBlock) => {
                    stats.ignored += 1;
                    continue;
                }
                Err(ProcessorError::FutureBlock) => {
                    let max = unix_now() + self.config.max_time_future_blocks;
                    if block.header().time > max {
                        return Err(InsertError::new(
                            i,
                            ChainError::TooFarInFuture {
                                hash: block.hash(),
                                number: block.number(),
                                time: block.header().time,
                                max,
                            },
                        ));
                    }
                    self.future_blocks.lock().push(block.clone());
                    stats.queued += 1;
                    continue;
                }
                Err(err @ ProcessorError::ParentMissing(_)) => {
                    if self.future_blocks.lock().has(&block.parent_hash()) {
                        self.future_blocks.lock().push(block.clone());
                        stats.queued += 1;
                        continue;
                    }
                    block_err(block, &err);
                    return Err(InsertError::new(i, err.into()));
                }
                Err(err) => {
                    block_err(block, &err);
                    return Err(InsertError::new(i, err.into()));
                }
            };

            tx_count += block.transactions.len();

            let (current, current_td) = {
                let head = self.head.read();
                (head.current.clone(), head.td)
            };
            if td > current_td {
                // A fork is overtaking the canonical chain.
                if block.parent_hash() != current.hash() {
                    if let Err(err) = self.merge(current, block.clone()) {
                        return Err(InsertError::new(i, err));
                    }
                    events.push(ChainNotification::Split(ChainSplitEvent {
                        block: block.clone(),
                        logs: logs.clone(),
                    }));
                }

                {
                    let mut head = self.head.write();
                    if let Err(err) = self.write_head(&mut head, block.clone(), td) {
                        return Err(InsertError::new(i, err));
                    }
                }
                *self.transient_root.write() = block.header().state_root;

                debug!(
                    target: "chain",
                    number = block.number(),
                    hash = %block.hash(),
                    txs = block.transactions.len(),
                    uncles = block.uncles.len(),
                    "inserted block"
                );
                events.push(ChainNotification::Chain(ChainEvent {
                    block: block.clone(),
                    hash: block.hash(),
                    logs,
                }));
            } else {
                trace!(
                    target: "chain",
                    number = block.number(),
                    hash = %block.hash(),
                    difficulty = %block.header().difficulty,
                    "inserted forked block"
                );
                events.push(ChainNotification::Side(ChainSideEvent { block: block.clone(), logs }));
            }

            if let Err(err) = self.store.put_block(block, td) {
                return Err(InsertError::new(i, err.into()));
            }
            self.cache.lock().push(block.clone());
            self.future_blocks.lock().remove(&block.hash());
            stats.processed += 1;
        }

        if stats.processed > 0 || stats.queued > 0 || stats.ignored > 0 {
            let last = blocks.last().expect("batch is not empty");
            info!(
                target: "chain",
                processed = stats.processed,
                queued = stats.queued,
                ignored = stats.ignored,
                txs = tx_count,
                number = last.number(),
                elapsed = ?started.elapsed(),
                "imported blocks"
            );
        }

        let _ = self.batch_tx.send(events);
        Ok(())
    }

    /// Signal interrupt, wait out any in-flight import and join the
    /// background worker.
    pub fn stop(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
        drop(self.import_lock.lock());
        let _ = self.quit_tx.send(());
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
        info!(target: "chain", "chain manager stopped");
    }

    /// Load the persisted head, or install the genesis on a fresh database.
    fn load_last_state(&self) -> Result<(), ChainError> {
        match self.store.last()? {
            Some(hash) => {
                let (block, td) =
                    self.store.block_by_hash(hash)?.ok_or(ChainError::MissingHead(hash))?;
                let block = Arc::new(block);
                {
                    let mut head = self.head.write();
                    head.current = block.clone();
                    head.td = td;
                    head.last_hash = block.hash();
                }
                *self.transient_root.write() = block.header().state_root;
                info!(
                    target: "chain",
                    number = block.number(),
                    hash = %block.hash(),
                    td = %td,
                    "loaded last block"
                );
                Ok(())
            }
            None => self.reset(),
        }
    }

    fn reset_to(&self, genesis: Arc<SealedBlock>) -> Result<(), ChainError> {
        {
            let mut head = self.head.write();
            let mut cursor = Some(head.current.clone());
            while let Some(block) = cursor {
                self.store.delete_block(block.hash())?;
                cursor = self.store.block_by_hash(block.parent_hash())?.map(|(b, _)| Arc::new(b));
            }

            let td = genesis.header().difficulty;
            self.store.put_block(&genesis, td)?;
            self.store.set_canonical(genesis.number(), genesis.hash())?;
            self.store.set_last(genesis.hash())?;
            head.current = genesis.clone();
            head.td = td;
            head.last_hash = genesis.hash();
        }
        *self.transient_root.write() = genesis.header().state_root;

        let mut cache = self.cache.lock();
        *cache = BlockCache::new(self.config.block_cache_limit);
        cache.push(genesis);
        Ok(())
    }

    /// Refill the recent-chain cache from the current head's ancestry.
    fn rebuild_cache(&self) {
        let current = self.current_block();
        let window = (self.config.block_cache_limit as usize).saturating_sub(1);
        let mut blocks = self.get_ancestors(&current, window);
        blocks.reverse();
        blocks.push(current);

        let mut cache = self.cache.lock();
        *cache = BlockCache::new(self.config.block_cache_limit);
        for block in blocks {
            cache.push(block);
        }
    }

    /// Install `block` as the canonical head. The head lock is held by the
    /// caller.
    fn write_head(
        &self,
        head: &mut HeadState,
        block: Arc<SealedBlock>,
        td: U256,
    ) -> Result<(), ChainError> {
        self.store.set_canonical(block.number(), block.hash())?;
        self.store.set_last(block.hash())?;
        head.current = block.clone();
        head.last_hash = block.hash();
        head.td = td;
        Ok(())
    }

    /// Promote the branch ending in `new` to canonical.
    ///
    /// The buffered branch is re-stamped in the number index as one promote
    /// set; the head pointer itself is installed by the insertion loop so
    /// the final block is recorded last.
    fn merge(&self, old: Arc<SealedBlock>, new: Arc<SealedBlock>) -> Result<(), ChainError> {
        let fork = self.find_fork(old.clone(), new.clone())?;
        info!(
            target: "chain",
            from = %old.hash(),
            to = %new.hash(),
            depth = fork.len(),
            "fork detected, reorganising chain"
        );

        let _head = self.head.write();
        for block in &fork {
            self.store.set_canonical(block.number(), block.hash())?;
        }
        Ok(())
    }

    /// Walk both branches back to their common ancestor, accumulating the
    /// new side.
    fn find_fork(
        &self,
        mut old: Arc<SealedBlock>,
        mut new: Arc<SealedBlock>,
    ) -> Result<Vec<Arc<SealedBlock>>, ChainError> {
        let mut new_chain = Vec::new();

        // Align heights first, then advance in lockstep.
        while old.number() > new.number() {
            old = self.get_block(old.parent_hash()).ok_or(ChainError::InvalidOldChain)?;
        }
        while new.number() > old.number() {
            new_chain.push(new.clone());
            new = self.get_block(new.parent_hash()).ok_or(ChainError::InvalidNewChain)?;
        }
        while old.hash() != new.hash() {
            new_chain.push(new.clone());
            old = self.get_block(old.parent_hash()).ok_or(ChainError::InvalidOldChain)?;
            new = self.get_block(new.parent_hash()).ok_or(ChainError::InvalidNewChain)?;
        }

        debug!(target: "chain", ancestor = %old.hash(), number = old.number(), "found common ancestor");
        Ok(new_chain)
    }

    /// Event dispatch and future-block drain loop, run on the background
    /// worker thread.
    fn update_loop(
        self: Arc<Self>,
        batch_rx: Receiver<Vec<ChainNotification>>,
        quit_rx: Receiver<()>,
    ) {
        let ticker = crossbeam_channel::tick(self.config.future_block_interval);
        loop {
            crossbeam_channel::select! {
                recv(batch_rx) -> batch => match batch {
                    Ok(events) => self.dispatch(events),
                    Err(_) => break,
                },
                recv(ticker) -> _ => self.process_future_blocks(),
                recv(quit_rx) -> _ => break,
            }
        }
    }

    /// Fan a batched event queue out to subscribers, announcing the settled
    /// head first.
    fn dispatch(&self, events: Vec<ChainNotification>) {
        for event in events {
            if let ChainNotification::Chain(ref ev) = event {
                if self.head.read().last_hash == ev.hash {
                    let _ = self.notifications.send(ChainNotification::Head(ChainHeadEvent {
                        block: ev.block.clone(),
                    }));
                }
            }
            let _ = self.notifications.send(event);
        }
    }

    /// Re-submit parked future blocks, lowest number first.
    fn process_future_blocks(&self) {
        let mut blocks = Vec::new();
        self.future_blocks.lock().each(|block| blocks.push(block.clone()));
        if blocks.is_empty() {
            return;
        }
        blocks.sort_by_key(|block| block.number());
        if let Err(err) = self.insert_chain(blocks) {
            debug!(target: "chain", %err, "failed to re-import future blocks");
        }
    }
}

impl<DB: KeyValueStore + Send + Sync + 'static> LocalChain for ChainManager<DB> {
    fn has_block(&self, hash: B256) -> bool {
        Self::has_block(self, hash)
    }

    fn block_number(&self, hash: B256) -> Option<BlockNumber> {
        self.get_block(hash).map(|block| block.number())
    }
}

fn block_err(block: &SealedBlock, err: &dyn fmt::Display) {
    error!(target: "chain", number = block.number(), hash = %block.hash(), %err, "bad block");
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use assert_matches::assert_matches;
    use alloy_rlp::Decodable;
    use ember_interfaces::{
        db::MemoryStore,
        test_utils::{child_block, genesis_block, unix_now, TestPow, TestProcessor},
    };
    use ember_primitives::constants::MINIMUM_DIFFICULTY;
    use std::time::Duration;

    const DIFF: u64 = 131_072;

    struct Fixture {
        manager: Arc<ChainManager<Arc<MemoryStore>>>,
        processor: Arc<TestProcessor>,
        genesis: SealedBlock,
        db: Arc<MemoryStore>,
    }

    fn setup() -> Fixture {
        setup_with(ChainConfig::default(), TestPow::default())
    }

    fn setup_with(config: ChainConfig, pow: TestPow) -> Fixture {
        let genesis = genesis_block();
        let db = Arc::new(MemoryStore::new());
        let manager =
            ChainManager::new(genesis.clone(), db.clone(), Arc::new(pow), config).unwrap();
        let processor = Arc::new(TestProcessor::new(genesis.hash()));
        manager.set_processor(processor.clone());
        Fixture { manager, processor, genesis, db }
    }

    /// A chain of `len` blocks over `parent` where block `i` (1-based) has
    /// difficulty `base + i` and a timestamp 10 seconds after its parent.
    fn chain_with_rising_difficulty(
        parent: &SealedBlock,
        base: u64,
        len: usize,
    ) -> Vec<Arc<SealedBlock>> {
        let mut chain = Vec::with_capacity(len);
        let mut parent = parent.clone();
        for i in 1..=len as u64 {
            let block =
                child_block(&parent, U256::from(base + i), parent.header().time + 10);
            chain.push(Arc::new(block.clone()));
            parent = block;
        }
        chain
    }

    /// A chain of `len` blocks over `parent` at constant difficulty `diff`.
    fn chain_with_difficulty(
        parent: &SealedBlock,
        diff: u64,
        len: usize,
    ) -> Vec<Arc<SealedBlock>> {
        let mut chain = Vec::with_capacity(len);
        let mut parent = parent.clone();
        for _ in 0..len {
            let block =
                child_block(&parent, U256::from(diff), parent.header().time + 10);
            chain.push(Arc::new(block.clone()));
            parent = block;
        }
        chain
    }

    #[test]
    fn fresh_database_installs_genesis() {
        let Fixture { manager, genesis, .. } = setup();
        assert_eq!(manager.current_block().hash(), genesis.hash());
        assert_eq!(manager.td(), genesis.header().difficulty);
        assert_eq!(manager.last_block_hash(), genesis.hash());
        assert_eq!(manager.genesis().hash(), genesis.hash());
        assert!(manager.has_block(genesis.hash()));
        manager.stop();
    }

    #[test]
    fn linear_import_advances_head() {
        let Fixture { manager, genesis, .. } = setup();
        let mut events = manager.subscribe();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 10);

        manager.insert_chain(chain.clone()).unwrap();

        assert_eq!(manager.current_block().hash(), chain[9].hash());
        let expected_td = (1..=10u64)
            .fold(genesis.header().difficulty, |acc, i| acc + U256::from(DIFF + i));
        assert_eq!(manager.td(), expected_td);

        // Nine plain head advances, then the settled-head notice and the
        // final head advance.
        for block in chain.iter().take(9) {
            assert_matches!(
                events.blocking_recv().unwrap(),
                ChainNotification::Chain(ev) => assert_eq!(ev.hash, block.hash())
            );
        }
        assert_matches!(
            events.blocking_recv().unwrap(),
            ChainNotification::Head(ev) => assert_eq!(ev.block.hash(), chain[9].hash())
        );
        assert_matches!(
            events.blocking_recv().unwrap(),
            ChainNotification::Chain(ev) => assert_eq!(ev.hash, chain[9].hash())
        );
        manager.stop();
    }

    #[test]
    fn td_accounting_follows_parent_links() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 5);
        manager.insert_chain(chain.clone()).unwrap();

        let mut expected = genesis.header().difficulty;
        for block in &chain {
            expected += block.header().difficulty;
            let (_, td) = manager.store.block_by_hash(block.hash()).unwrap().unwrap();
            assert_eq!(td, expected);
        }
        manager.stop();
    }

    #[test]
    fn reorg_promotes_heavier_fork() {
        let Fixture { manager, genesis, .. } = setup();
        let mut events = manager.subscribe();

        // Main chain at double difficulty, side branch at single difficulty
        // but three blocks longer, overtaking only at its tip.
        let main = chain_with_difficulty(&genesis, 2 * DIFF, 5);
        manager.insert_chain(main.clone()).unwrap();
        let main_td = manager.td();
        // Drain the first batch: four head advances, settle notice, final
        // head advance.
        for _ in 0..6 {
            events.blocking_recv().unwrap();
        }
        // Branch off the main chain at block 3; vary the timestamp so the
        // side blocks get distinct hashes.
        let mut side = Vec::new();
        let mut parent = (*main[2]).clone();
        for _ in 0..5 {
            let block =
                child_block(&parent, U256::from(DIFF), parent.header().time + 7);
            side.push(Arc::new(block.clone()));
            parent = block;
        }

        manager.insert_chain(side.clone()).unwrap();

        // Only the tip overtakes: four side events, then split and the new
        // head.
        for block in side.iter().take(4) {
            assert_matches!(
                events.blocking_recv().unwrap(),
                ChainNotification::Side(ev) => assert_eq!(ev.block.hash(), block.hash())
            );
        }
        assert_matches!(
            events.blocking_recv().unwrap(),
            ChainNotification::Split(ev) => assert_eq!(ev.block.hash(), side[4].hash())
        );
        assert_matches!(events.blocking_recv().unwrap(), ChainNotification::Head(_));
        assert_matches!(
            events.blocking_recv().unwrap(),
            ChainNotification::Chain(ev) => assert_eq!(ev.hash, side[4].hash())
        );

        assert_eq!(manager.current_block().hash(), side[4].hash());
        assert!(manager.td() > main_td);

        // The whole branch is indexed by number now.
        for block in &side {
            assert_eq!(
                manager.get_block_by_number(block.number()).unwrap().hash(),
                block.hash()
            );
        }
        // The displaced blocks stay retrievable by hash.
        assert!(manager.get_block(main[3].hash()).is_some());
        assert!(manager.get_block(main[4].hash()).is_some());
        manager.stop();
    }

    #[test]
    fn future_block_is_parked() {
        let Fixture { manager, genesis, .. } = setup();
        let block =
            Arc::new(child_block(&genesis, U256::from(DIFF), unix_now() + 10));

        manager.insert_chain(vec![block.clone()]).unwrap();

        assert_eq!(manager.current_block().hash(), genesis.hash());
        assert!(manager.future_blocks.lock().has(&block.hash()));
        manager.stop();
    }

    #[test]
    fn block_too_far_in_future_is_fatal() {
        let Fixture { manager, genesis, .. } = setup();
        let block =
            Arc::new(child_block(&genesis, U256::from(DIFF), unix_now() + 40));

        let err = manager.insert_chain(vec![block]).unwrap_err();
        assert_eq!(err.index, 0);
        assert_matches!(err.kind, ChainError::TooFarInFuture { .. });
        assert_eq!(manager.current_block().hash(), genesis.hash());
        manager.stop();
    }

    #[test]
    fn child_of_parked_block_is_parked() {
        let Fixture { manager, processor, genesis, .. } = setup();
        let parked =
            Arc::new(child_block(&genesis, U256::from(DIFF), unix_now() + 8));
        let child = Arc::new(child_block(
            &parked,
            U256::from(DIFF),
            parked.header().time + 10,
        ));
        processor.force(child.hash(), ProcessorError::ParentMissing(parked.hash()));

        manager.insert_chain(vec![parked.clone()]).unwrap();
        manager.insert_chain(vec![child.clone()]).unwrap();

        assert!(manager.future_blocks.lock().has(&parked.hash()));
        assert!(manager.future_blocks.lock().has(&child.hash()));
        manager.stop();
    }

    #[test]
    fn future_block_drains_once_current() {
        let mut config = ChainConfig::default();
        config.future_block_interval = Duration::from_millis(100);
        let Fixture { manager, genesis, .. } = setup_with(config, TestPow::default());

        let block =
            Arc::new(child_block(&genesis, U256::from(DIFF), unix_now() + 1));
        manager.insert_chain(vec![block.clone()]).unwrap();
        assert_eq!(manager.current_block().hash(), genesis.hash());

        let deadline = Instant::now() + Duration::from_secs(5);
        while manager.current_block().hash() != block.hash() {
            assert!(Instant::now() < deadline, "future block was never drained");
            thread::sleep(Duration::from_millis(50));
        }
        assert!(!manager.future_blocks.lock().has(&block.hash()));
        manager.stop();
    }

    #[test]
    fn bad_nonce_fails_at_offending_index() {
        let genesis = genesis_block();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 3);
        let pow = TestPow::default().fail_on(chain[1].hash());
        let Fixture { manager, .. } = setup_with(ChainConfig::default(), pow);

        let err = manager.insert_chain(chain.clone()).unwrap_err();
        assert_eq!(err.index, 1);
        assert_matches!(err.kind, ChainError::BlockNonce { hash, .. } => {
            assert_eq!(hash, chain[1].hash())
        });
        // The batch prefix stays imported.
        assert_eq!(manager.current_block().hash(), chain[0].hash());
        manager.stop();
    }

    #[test]
    fn bad_hash_fails_import() {
        let genesis = genesis_block();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 3);
        let config = ChainConfig::default().with_bad_hash(chain[2].hash());
        let Fixture { manager, .. } = setup_with(config, TestPow::default());

        let err = manager.insert_chain(chain.clone()).unwrap_err();
        assert_eq!(err.index, 2);
        assert_matches!(err.kind, ChainError::BadHash(hash) => assert_eq!(hash, chain[2].hash()));
        assert_eq!(manager.current_block().hash(), chain[1].hash());
        manager.stop();
    }

    #[test]
    fn known_blocks_are_ignored() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 3);

        manager.insert_chain(chain.clone()).unwrap();
        let td = manager.td();
        manager.insert_chain(chain.clone()).unwrap();

        assert_eq!(manager.td(), td);
        assert_eq!(manager.current_block().hash(), chain[2].hash());
        manager.stop();
    }

    #[test]
    fn missing_parent_is_fatal_without_parked_parent() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 2);

        // Submit the child without its parent.
        let err = manager.insert_chain(vec![chain[1].clone()]).unwrap_err();
        assert_eq!(err.index, 0);
        assert_matches!(err.kind, ChainError::Processor(ProcessorError::ParentMissing(_)));
        manager.stop();
    }

    #[test]
    fn block_hashes_from_walk_matches_number_index() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 8);
        manager.insert_chain(chain.clone()).unwrap();

        let head = manager.current_block();
        let mut hashes = manager.get_block_hashes_from(head.hash(), head.number() as usize);
        hashes.reverse();

        assert_eq!(hashes.len(), head.number() as usize);
        for (n, hash) in hashes.iter().enumerate() {
            assert_eq!(manager.get_block_by_number(n as u64).unwrap().hash(), *hash);
        }
        manager.stop();
    }

    #[test]
    fn ancestors_and_uncles() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 4);
        manager.insert_chain(chain.clone()).unwrap();

        let ancestors = manager.get_ancestors(&chain[3], 2);
        assert_eq!(ancestors.len(), 2);
        assert_eq!(ancestors[0].hash(), chain[2].hash());
        assert_eq!(ancestors[1].hash(), chain[1].hash());

        // An uncle-carrying block on top of the chain.
        let uncle = child_block(&chain[2], U256::from(DIFF), chain[2].header().time + 9);
        let mut block = manager.new_block(chain[3].header().time + 10);
        block.uncles.push(uncle.header().clone());
        let block = Arc::new(block.seal_slow());
        manager.insert_chain(vec![block.clone()]).unwrap();

        let uncles = manager.get_uncles_in_chain(block.clone(), 3);
        assert_eq!(uncles.len(), 1);
        assert_eq!(uncles[0], *uncle.header());

        // The uncle-inclusive recomputation exceeds the stored parent link.
        let td = manager.calc_total_diff(&block).unwrap();
        let (_, stored_td) = manager.store.block_by_hash(block.hash()).unwrap().unwrap();
        assert_eq!(td, stored_td + uncle.header().difficulty);
        manager.stop();
    }

    #[test]
    fn set_head_rewinds_and_purges() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 5);
        manager.insert_chain(chain.clone()).unwrap();

        manager.set_head(chain[2].clone()).unwrap();

        assert_eq!(manager.current_block().hash(), chain[2].hash());
        let (_, td) = manager.store.block_by_hash(chain[2].hash()).unwrap().unwrap();
        assert_eq!(manager.td(), td);
        assert!(manager.get_block(chain[3].hash()).is_none());
        assert!(manager.get_block(chain[4].hash()).is_none());
        assert_eq!(manager.transient_root(), chain[2].header().state_root);
        manager.stop();
    }

    #[test]
    fn reset_reinstalls_genesis() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 3);
        manager.insert_chain(chain.clone()).unwrap();

        manager.reset().unwrap();

        assert_eq!(manager.current_block().hash(), genesis.hash());
        assert_eq!(manager.td(), genesis.header().difficulty);
        assert!(manager.get_block(chain[0].hash()).is_none());
        manager.stop();
    }

    #[test]
    fn reset_with_new_genesis() {
        let Fixture { manager, .. } = setup();
        let other = Block {
            header: Header {
                number: 0,
                difficulty: MINIMUM_DIFFICULTY,
                time: 42,
                ..Default::default()
            },
            ..Default::default()
        }
        .seal_slow();

        manager.reset_with_genesis(other.clone()).unwrap();

        assert_eq!(manager.genesis().hash(), other.hash());
        assert_eq!(manager.current_block().hash(), other.hash());
        let (status_td, head, genesis_hash) = manager.status();
        assert_eq!(status_td, other.header().difficulty);
        assert_eq!(head, other.hash());
        assert_eq!(genesis_hash, other.hash());
        manager.stop();
    }

    #[test]
    fn export_writes_canonical_encoding() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 3);
        manager.insert_chain(chain.clone()).unwrap();

        let mut out = Vec::new();
        manager.export(&mut out).unwrap();

        let mut buf = out.as_slice();
        let mut decoded = Vec::new();
        while !buf.is_empty() {
            decoded.push(Block::decode(&mut buf).unwrap().seal_slow());
        }
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].hash(), genesis.hash());
        assert_eq!(decoded[3].hash(), chain[2].hash());

        assert_matches!(
            manager.export_range(&mut Vec::new(), 3, 1),
            Err(ExportError::InvalidRange { first: 3, last: 1 })
        );
        assert_matches!(
            manager.export_range(&mut Vec::new(), 0, 9),
            Err(ExportError::MissingBlock(4))
        );
        manager.stop();
    }

    #[test]
    fn restart_resumes_from_persisted_head() {
        let Fixture { manager, processor, genesis, db } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 4);
        manager.insert_chain(chain.clone()).unwrap();
        let td = manager.td();
        manager.stop();

        let reopened = ChainManager::new(
            genesis.clone(),
            db,
            Arc::new(TestPow::default()),
            ChainConfig::default(),
        )
        .unwrap();
        reopened.set_processor(processor);

        assert_eq!(reopened.current_block().hash(), chain[3].hash());
        assert_eq!(reopened.td(), td);
        reopened.stop();
    }

    #[test]
    fn genesis_mismatch_refuses_to_start() {
        let Fixture { manager, genesis, db, .. } = setup();
        manager.stop();

        let other = Block {
            header: Header { number: 0, difficulty: U256::from(DIFF), time: 7, ..Default::default() },
            ..Default::default()
        }
        .seal_slow();

        let err =
            ChainManager::new(other.clone(), db, Arc::new(TestPow::default()), ChainConfig::default())
                .unwrap_err();
        assert_matches!(err, ChainError::GenesisMismatch { stored, configured } => {
            assert_eq!(stored, genesis.hash());
            assert_eq!(configured, other.hash());
        });
    }

    #[test]
    fn bad_hash_on_disk_rewinds_at_startup() {
        let Fixture { manager, genesis, db, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 5);
        manager.insert_chain(chain.clone()).unwrap();
        manager.stop();

        let config = ChainConfig::default().with_bad_hash(chain[3].hash());
        let reopened =
            ChainManager::new(genesis.clone(), db, Arc::new(TestPow::default()), config).unwrap();

        assert_eq!(reopened.current_block().hash(), chain[2].hash());
        assert!(reopened.get_block(chain[3].hash()).is_none());
        assert!(reopened.get_block(chain[4].hash()).is_none());
        reopened.stop();
    }

    #[test]
    fn stop_interrupts_further_imports() {
        let Fixture { manager, genesis, .. } = setup();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 3);
        manager.stop();

        // Interrupted imports return cleanly without touching the head.
        manager.insert_chain(chain).unwrap();
        assert_eq!(manager.current_block().hash(), genesis.hash());
    }

    #[test]
    fn new_block_template_follows_rules() {
        let Fixture { manager, genesis, .. } = setup();
        let time = genesis.header().time + 5;
        let template = manager.new_block(time);

        assert_eq!(template.header.parent_hash, genesis.hash());
        assert_eq!(template.header.number, 1);
        assert_eq!(template.header.difficulty, calc_difficulty(time, genesis.header()));
        assert_eq!(template.header.gas_limit, calc_gas_limit(genesis.header()));
        manager.stop();
    }

    #[test]
    fn insert_without_processor_fails() {
        let genesis = genesis_block();
        let manager = ChainManager::new(
            genesis.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(TestPow::default()),
            ChainConfig::default(),
        )
        .unwrap();
        let chain = chain_with_rising_difficulty(&genesis, DIFF, 1);

        let err = manager.insert_chain(chain).unwrap_err();
        assert_matches!(err.kind, ChainError::ProcessorUnset);
        manager.stop();
    }
}
