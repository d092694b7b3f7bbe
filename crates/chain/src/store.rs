use alloy_rlp::Decodable;
use ember_interfaces::db::{DbError, KeyValueStore};
use ember_primitives::{BlockHash, BlockNumber, SealedBlock, StoredBlock, B256, U256};

/// Keyspace of content-addressed blocks.
const BLOCK_HASH_PREFIX: &[u8] = b"block-hash-";
/// Keyspace of the canonical number index.
const BLOCK_NUM_PREFIX: &[u8] = b"block-num-";
/// Key of the persisted head pointer.
const LAST_BLOCK_KEY: &[u8] = b"LastBlock";

/// Errors returned by the block store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error(transparent)]
    Db(#[from] DbError),
    /// A stored block failed to decode.
    #[error("corrupt block encoding: {0}")]
    Rlp(#[from] alloy_rlp::Error),
    /// A number-index or head entry does not hold a 32-byte hash.
    #[error("corrupt hash entry in index")]
    CorruptIndex,
}

/// Content-addressed and number-indexed block store over a raw key-value
/// database.
///
/// Two keyspaces are maintained: `"block-hash-" || hash` holds the canonical
/// encoding of a block together with its total difficulty, and
/// `"block-num-" || minimal-big-endian(number)` maps canonical heights to
/// hashes. The distinguished `"LastBlock"` key names the persisted head.
#[derive(Debug)]
pub struct BlockStore<DB> {
    db: DB,
}

impl<DB: KeyValueStore> BlockStore<DB> {
    /// Create a store over the given database.
    pub const fn new(db: DB) -> Self {
        Self { db }
    }

    fn hash_key(hash: &BlockHash) -> Vec<u8> {
        let mut key = Vec::with_capacity(BLOCK_HASH_PREFIX.len() + 32);
        key.extend_from_slice(BLOCK_HASH_PREFIX);
        key.extend_from_slice(hash.as_slice());
        key
    }

    fn num_key(number: BlockNumber) -> Vec<u8> {
        let bytes = number.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let mut key = Vec::with_capacity(BLOCK_NUM_PREFIX.len() + 8);
        key.extend_from_slice(BLOCK_NUM_PREFIX);
        key.extend_from_slice(&bytes[first..]);
        key
    }

    /// Persist a block and its total difficulty under its hash.
    pub fn put_block(&self, block: &SealedBlock, td: U256) -> Result<(), StoreError> {
        let encoded = alloy_rlp::encode(StoredBlock::new(block, td));
        self.db.put(&Self::hash_key(&block.hash()), &encoded)?;
        Ok(())
    }

    /// Read a block and its total difficulty by hash.
    pub fn block_by_hash(
        &self,
        hash: BlockHash,
    ) -> Result<Option<(SealedBlock, U256)>, StoreError> {
        let Some(raw) = self.db.get(&Self::hash_key(&hash))? else { return Ok(None) };
        let stored = StoredBlock::decode(&mut raw.as_slice())?;
        Ok(Some(stored.split()))
    }

    /// Whether a block is stored under the given hash.
    pub fn has_block(&self, hash: BlockHash) -> Result<bool, StoreError> {
        Ok(self.db.get(&Self::hash_key(&hash))?.is_some())
    }

    /// Remove the block stored under the given hash.
    pub fn delete_block(&self, hash: BlockHash) -> Result<(), StoreError> {
        self.db.delete(&Self::hash_key(&hash))?;
        Ok(())
    }

    /// The canonical hash at the given height.
    pub fn hash_by_number(&self, number: BlockNumber) -> Result<Option<BlockHash>, StoreError> {
        let Some(raw) = self.db.get(&Self::num_key(number))? else { return Ok(None) };
        decode_hash(&raw).map(Some)
    }

    /// The canonical block at the given height.
    pub fn block_by_number(
        &self,
        number: BlockNumber,
    ) -> Result<Option<(SealedBlock, U256)>, StoreError> {
        match self.hash_by_number(number)? {
            Some(hash) => self.block_by_hash(hash),
            None => Ok(None),
        }
    }

    /// Stamp the given hash as canonical at the given height.
    pub fn set_canonical(&self, number: BlockNumber, hash: BlockHash) -> Result<(), StoreError> {
        self.db.put(&Self::num_key(number), hash.as_slice())?;
        Ok(())
    }

    /// Persist the head pointer.
    pub fn set_last(&self, hash: BlockHash) -> Result<(), StoreError> {
        self.db.put(LAST_BLOCK_KEY, hash.as_slice())?;
        Ok(())
    }

    /// The persisted head pointer, if any.
    pub fn last(&self) -> Result<Option<BlockHash>, StoreError> {
        let Some(raw) = self.db.get(LAST_BLOCK_KEY)? else { return Ok(None) };
        decode_hash(&raw).map(Some)
    }
}

fn decode_hash(raw: &[u8]) -> Result<B256, StoreError> {
    B256::try_from(raw).map_err(|_| StoreError::CorruptIndex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_interfaces::{
        db::MemoryStore,
        test_utils::{genesis_block, linear_chain},
    };
    use ember_primitives::constants::MINIMUM_DIFFICULTY;

    #[test]
    fn block_roundtrip() {
        let store = BlockStore::new(MemoryStore::new());
        let genesis = genesis_block();
        let td = MINIMUM_DIFFICULTY;

        assert!(!store.has_block(genesis.hash()).unwrap());
        store.put_block(&genesis, td).unwrap();
        assert!(store.has_block(genesis.hash()).unwrap());
        assert_eq!(store.block_by_hash(genesis.hash()).unwrap(), Some((genesis.clone(), td)));

        store.delete_block(genesis.hash()).unwrap();
        assert_eq!(store.block_by_hash(genesis.hash()).unwrap(), None);
    }

    #[test]
    fn number_index() {
        let store = BlockStore::new(MemoryStore::new());
        let genesis = genesis_block();
        let chain = linear_chain(&genesis, 3);

        store.set_canonical(0, genesis.hash()).unwrap();
        for block in &chain {
            store.put_block(block, MINIMUM_DIFFICULTY).unwrap();
            store.set_canonical(block.number(), block.hash()).unwrap();
        }

        assert_eq!(store.hash_by_number(0).unwrap(), Some(genesis.hash()));
        assert_eq!(store.hash_by_number(2).unwrap(), Some(chain[1].hash()));
        assert_eq!(store.hash_by_number(9).unwrap(), None);
        assert_eq!(
            store.block_by_number(3).unwrap().map(|(b, _)| b.hash()),
            Some(chain[2].hash())
        );
    }

    #[test]
    fn number_keys_use_minimal_big_endian_bytes() {
        assert_eq!(BlockStore::<MemoryStore>::num_key(0), b"block-num-".to_vec());
        assert_eq!(BlockStore::<MemoryStore>::num_key(1), b"block-num-\x01".to_vec());
        assert_eq!(BlockStore::<MemoryStore>::num_key(256), b"block-num-\x01\x00".to_vec());
        assert_eq!(
            BlockStore::<MemoryStore>::num_key(0x0102_0304),
            b"block-num-\x01\x02\x03\x04".to_vec()
        );
    }

    #[test]
    fn last_pointer() {
        let store = BlockStore::new(MemoryStore::new());
        assert_eq!(store.last().unwrap(), None);

        let genesis = genesis_block();
        store.set_last(genesis.hash()).unwrap();
        assert_eq!(store.last().unwrap(), Some(genesis.hash()));
    }
}
