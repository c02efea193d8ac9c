use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BlockId, BLOCK_NUM, BLOCK_SIZE},
};

/// 内存中的虚拟磁盘，进程退出即丢失
#[derive(Debug, Clone)]
pub struct MemDisk {
    blocks: Vec<Block>,
}

impl MemDisk {
    pub fn new(block_count: u32) -> Self {
        Self {
            blocks: vec![[0; BLOCK_SIZE]; block_count as usize],
        }
    }
}

impl Default for MemDisk {
    fn default() -> Self {
        Self::new(BLOCK_NUM)
    }
}

impl BlockDevice for MemDisk {
    fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }

    fn read_block(&self, block_id: BlockId, buf: &mut Block) {
        if let Some(block) = self.blocks.get(block_id as usize) {
            buf.copy_from_slice(block);
        }
    }

    fn write_block(&mut self, block_id: BlockId, buf: &Block) {
        if let Some(block) = self.blocks.get_mut(block_id as usize) {
            block.copy_from_slice(buf);
        }
    }
}
