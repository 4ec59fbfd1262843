//! Thread-safe in-memory block database for tests and simulation.

use crate::{BlockDatabase, StoreError};
use braid_types::{Block, BlockHash};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory [`BlockDatabase`].
///
/// Blocks are held bincode-encoded so reads hand back independent copies,
/// the same way a real backend would.
pub struct MemoryBlockDb {
    blocks: Mutex<HashMap<[u8; 32], Vec<u8>>>,
}

impl MemoryBlockDb {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().expect("block map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBlockDb {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(block: &Block) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(block).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl BlockDatabase for MemoryBlockDb {
    fn put(&self, block: &Block) -> Result<(), StoreError> {
        let bytes = encode(block)?;
        let mut blocks = self.blocks.lock().expect("block map poisoned");
        if blocks.contains_key(block.hash.as_bytes()) {
            return Err(StoreError::AlreadyExists(block.hash.to_string()));
        }
        blocks.insert(*block.hash.as_bytes(), bytes);
        Ok(())
    }

    fn update(&self, block: &Block) -> Result<(), StoreError> {
        let bytes = encode(block)?;
        let mut blocks = self.blocks.lock().expect("block map poisoned");
        if !blocks.contains_key(block.hash.as_bytes()) {
            return Err(StoreError::NotFound(block.hash.to_string()));
        }
        blocks.insert(*block.hash.as_bytes(), bytes);
        Ok(())
    }

    fn get(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        let blocks = self.blocks.lock().expect("block map poisoned");
        let bytes = blocks
            .get(hash.as_bytes())
            .ok_or_else(|| StoreError::NotFound(hash.to_string()))?;
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn contains(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self
            .blocks
            .lock()
            .expect("block map poisoned")
            .contains_key(hash.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_types::{Position, Timestamp};

    fn make_block(tag: u8) -> Block {
        Block {
            position: Position::new(0, 0, tag as u64),
            timestamp: Timestamp::from_secs(tag as u64),
            hash: BlockHash::new([tag; 32]),
            ..Block::default()
        }
    }

    #[test]
    fn put_then_get_roundtrips() {
        let db = MemoryBlockDb::new();
        let block = make_block(1);
        db.put(&block).unwrap();
        assert_eq!(db.get(&block.hash).unwrap(), block);
    }

    #[test]
    fn put_duplicate_rejected() {
        let db = MemoryBlockDb::new();
        let block = make_block(2);
        db.put(&block).unwrap();
        assert!(matches!(db.put(&block), Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn update_requires_existing() {
        let db = MemoryBlockDb::new();
        let block = make_block(3);
        assert!(matches!(db.update(&block), Err(StoreError::NotFound(_))));

        db.put(&block).unwrap();
        let mut stamped = block.clone();
        stamped.consensus_timestamp = Timestamp::from_secs(42);
        db.update(&stamped).unwrap();
        assert_eq!(
            db.get(&block.hash).unwrap().consensus_timestamp,
            Timestamp::from_secs(42)
        );
    }

    #[test]
    fn get_missing_is_not_found() {
        let db = MemoryBlockDb::new();
        assert!(matches!(
            db.get(&BlockHash::new([9u8; 32])),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn contains_reflects_contents() {
        let db = MemoryBlockDb::new();
        let block = make_block(4);
        assert!(!db.contains(&block.hash).unwrap());
        db.put(&block).unwrap();
        assert!(db.contains(&block.hash).unwrap());
    }

    #[test]
    fn reads_are_independent_copies() {
        let db = MemoryBlockDb::new();
        let block = make_block(5);
        db.put(&block).unwrap();

        let mut copy = db.get(&block.hash).unwrap();
        copy.payload = b"mutated".to_vec();
        assert!(db.get(&block.hash).unwrap().payload.is_empty());
    }
}
