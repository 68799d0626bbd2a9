//! In-memory block store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::block::Block;
use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::store::BlockStore;

/// Keeps blocks in a map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<Checksum, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blocks stored.
    pub fn len(&self) -> usize {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for MemoryStore {
    fn write(&self, block: &Block) -> Result<()> {
        self.blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(block.checksum().clone())
            .or_insert_with(|| block.data().to_vec());
        Ok(())
    }

    fn read(&self, checksum: &Checksum) -> Result<Block> {
        let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
        blocks
            .get(checksum)
            .map(|data| Block::new(data.clone()))
            .ok_or_else(|| Error::NotFound(checksum.clone()))
    }

    fn exists(&self, checksum: &Checksum) -> bool {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(checksum)
    }
}
