use crate::disk::types::{Block, BlockId};

/// 块设备：只负责按块号读写，不理解块里的内容。
///
/// 块号越界时读写都是空操作（不报错），块号的合法性由上层自己校验。
pub trait BlockDevice: Send + Sync {
    fn block_count(&self) -> u32;
    fn read_block(&self, block_id: BlockId, buf: &mut Block);
    fn write_block(&mut self, block_id: BlockId, buf: &Block);
}
