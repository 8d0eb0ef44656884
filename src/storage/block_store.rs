use crate::core::Block;
use crate::error::Result;
use log::info;
use sled::{Batch, Db, Tree};

const BLOCKS_TREE: &str = "blocks";

/// Persisted chain: block index (big-endian u64) to bincode-encoded block.
/// Big-endian keys make sled's iteration order the chain order.
#[derive(Clone)]
pub struct BlockStore {
    tree: Tree,
}

impl BlockStore {
    pub fn open(db: &Db) -> Result<BlockStore> {
        let tree = db.open_tree(BLOCKS_TREE)?;
        Ok(BlockStore { tree })
    }

    pub fn load(&self) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            blocks.push(Block::deserialize(&value)?);
        }
        Ok(blocks)
    }

    pub fn append(&self, block: &Block) -> Result<()> {
        let key = block.get_index().to_be_bytes();
        self.tree.insert(key, block.serialize()?)?;
        self.tree.flush()?;
        Ok(())
    }

    /// Swap the stored chain for `blocks` in one atomic batch
    pub fn replace_all(&self, blocks: &[Block]) -> Result<()> {
        let mut batch = Batch::default();
        for key in self.tree.iter().keys() {
            batch.remove(key?);
        }
        for block in blocks {
            batch.insert(block.get_index().to_be_bytes().to_vec(), block.serialize()?);
        }
        self.tree.apply_batch(batch)?;
        self.tree.flush()?;
        info!("Persisted replacement chain of {} blocks", blocks.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
