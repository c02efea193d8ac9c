//! # 块分配器
//!
//! 磁盘布局：超级块 | 位图块 × nmaps | inode / jnode / knode 混放
//!
//! 两级位图：位图块里一位对应一个块，超级块里的元位图一位对应一个位图字。
//! 找空闲块时先看元位图跳过已满的字，再在位图字里取最低的空闲位，
//! 两步都是 de Bruijn 常数时间取位。扫描游标写在超级块里，
//! 每次从上一次命中的位置接着找。

use crate::{
    disk::{Access, Block, BlockDevice, BlockId, BlockView, MemDisk, Record},
    fs::{
        block_bitmap::{lowest_set_bit, map_block_id, BitPos, MapBlock},
        config::{BITS_PER_MAP, MAX_MAPS, META_WORDS, SUPER_BLOCK_ID},
        error::{FileSystemError, Result},
        super_block::SuperBlock,
    },
};

#[derive(Debug)]
pub struct BlockManager<D: BlockDevice = MemDisk> {
    device: D,
    nblocks: u32,
    nmaps: u32,
}

impl<D: BlockDevice> BlockManager<D> {
    /// 格式化磁盘：所有位先置为空闲，再把超级块、位图块自身
    /// 以及超出磁盘末尾的位标记为已用。
    pub fn format(mut device: D) -> Result<Self> {
        let nblocks = device.block_count();
        let nmaps = nblocks.div_ceil(BITS_PER_MAP);
        if nmaps > MAX_MAPS || nblocks <= nmaps + 1 {
            return Err(FileSystemError::Corrupted(format!(
                "unsupported disk geometry: {} blocks",
                nblocks
            )));
        }

        for group in 0..nmaps {
            let mut map = BlockView::<D, MapBlock>::open(
                &mut device,
                map_block_id(group),
                Access::WRITE_BACK,
            )?;
            map.fill();
        }
        {
            let mut sb =
                BlockView::<D, SuperBlock>::open(&mut device, SUPER_BLOCK_ID, Access::WRITE_BACK)?;
            *sb = SuperBlock::new(nblocks, nmaps);
        }

        let mut bm = Self {
            device,
            nblocks,
            nmaps,
        };
        for block_id in SUPER_BLOCK_ID..=nmaps {
            bm.mark_used(block_id)?;
        }
        for block_id in nblocks..nmaps * BITS_PER_MAP {
            bm.mark_used(block_id)?;
        }

        log::debug!("formatted {} blocks with {} map blocks", nblocks, nmaps);
        Ok(bm)
    }

    #[inline]
    pub fn nblocks(&self) -> u32 {
        self.nblocks
    }

    #[inline]
    pub fn nmaps(&self) -> u32 {
        self.nmaps
    }

    /// 分配一个空闲块；扫描完所有组仍找不到时返回 `DiskFull`
    pub fn alloc(&mut self) -> Result<BlockId> {
        let (group, word) = self.pick_word()?;

        let (bit, now_full) = {
            let mut map = self.view::<MapBlock>(map_block_id(group), Access::READ_WRITE)?;
            let bits = map.word_mut(word);
            if *bits == 0 {
                return Err(FileSystemError::Corrupted(format!(
                    "metamap marks word {} of group {} free but it has no free bit",
                    word, group
                )));
            }
            let bit = lowest_set_bit(*bits);
            *bits &= !(1 << bit);
            (bit, *bits == 0)
        };

        if now_full {
            let mut sb = self.view::<SuperBlock>(SUPER_BLOCK_ID, Access::READ_WRITE)?;
            sb.clear_meta(group, word);
        }

        let block_id = BitPos { group, word, bit }.block_id();
        log::trace!("alloc block {}", block_id);
        Ok(block_id)
    }

    /// 释放一个块。重复释放不做检查，由调用方保证块确实归自己所有。
    pub fn free(&mut self, block_id: BlockId) -> Result<()> {
        if block_id <= self.nmaps || block_id >= self.nblocks {
            return Err(FileSystemError::OutOfRange(block_id as u64));
        }

        let pos = BitPos::of(block_id);
        let was_full = {
            let mut map = self.view::<MapBlock>(map_block_id(pos.group), Access::READ_WRITE)?;
            let bits = map.word_mut(pos.word);
            let was_full = *bits == 0;
            *bits |= 1 << pos.bit;
            was_full
        };

        if was_full {
            let mut sb = self.view::<SuperBlock>(SUPER_BLOCK_ID, Access::READ_WRITE)?;
            sb.set_meta(pos.group, pos.word);
        }

        log::trace!("free block {}", block_id);
        Ok(())
    }

    pub fn is_free(&mut self, block_id: BlockId) -> Result<bool> {
        if block_id >= self.nblocks {
            return Err(FileSystemError::OutOfRange(block_id as u64));
        }
        let pos = BitPos::of(block_id);
        let map = self.load::<MapBlock>(map_block_id(pos.group))?;
        Ok(map.word(pos.word) & (1 << pos.bit) != 0)
    }

    /// 统计空闲块数（逐个位图块数 1）
    pub fn count_free(&mut self) -> Result<u32> {
        let mut free = 0;
        for group in 0..self.nmaps {
            free += self.load::<MapBlock>(map_block_id(group))?.count_free();
        }
        Ok(free)
    }

    #[inline]
    pub fn read_block(&self, block_id: BlockId, buf: &mut Block) {
        self.device.read_block(block_id, buf);
    }

    #[inline]
    pub fn write_block(&mut self, block_id: BlockId, buf: &Block) {
        self.device.write_block(block_id, buf);
    }

    /// 在某个块上打开一个视图
    #[inline]
    pub fn view<T: Record>(
        &mut self,
        block_id: BlockId,
        access: Access,
    ) -> Result<BlockView<'_, D, T>> {
        BlockView::open(&mut self.device, block_id, access)
    }

    /// 读出一个块的记录副本
    #[inline]
    pub fn load<T: Record>(&mut self, block_id: BlockId) -> Result<T> {
        Ok(self.view::<T>(block_id, Access::LOAD)?.into_record())
    }

    /// 从游标处开始找第一个还有空闲位的位图字，并把游标移到命中的位置
    fn pick_word(&mut self) -> Result<(u32, usize)> {
        let nmaps = self.nmaps;
        let mut sb = self.view::<SuperBlock>(SUPER_BLOCK_ID, Access::READ_WRITE)?;

        let start_group = sb.cursor_group % nmaps;
        let start_word = sb.cursor_word as usize % META_WORDS;
        for step in 0..nmaps {
            let group = (start_group + step) % nmaps;
            // 只有游标所在的组从游标处开始，其余组从头扫
            let first_word = if step == 0 { start_word } else { 0 };
            for offset in 0..META_WORDS {
                let meta_word = (first_word + offset) % META_WORDS;
                let meta = sb.metamap[group as usize][meta_word];
                if meta != 0 {
                    sb.cursor_group = group;
                    sb.cursor_word = meta_word as u32;
                    let word = meta_word * 32 + lowest_set_bit(meta) as usize;
                    return Ok((group, word));
                }
            }
        }

        log::debug!("no free block left in {} groups", nmaps);
        Err(FileSystemError::DiskFull)
    }

    /// 把一个块标记为已用（格式化时保留系统块）
    fn mark_used(&mut self, block_id: BlockId) -> Result<()> {
        let pos = BitPos::of(block_id);
        let now_full = {
            let mut map = self.view::<MapBlock>(map_block_id(pos.group), Access::READ_WRITE)?;
            let bits = map.word_mut(pos.word);
            *bits &= !(1 << pos.bit);
            *bits == 0
        };

        if now_full {
            let mut sb = self.view::<SuperBlock>(SUPER_BLOCK_ID, Access::READ_WRITE)?;
            sb.clear_meta(pos.group, pos.word);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::disk::BLOCK_SIZE;

    fn small(nblocks: u32) -> BlockManager {
        BlockManager::format(MemDisk::new(nblocks)).unwrap()
    }

    #[test]
    fn format_reserves_superblock_and_maps() {
        let mut bm = BlockManager::format(MemDisk::default()).unwrap();
        assert_eq!(bm.nmaps(), 8);
        for id in 0..=8 {
            assert!(!bm.is_free(id).unwrap(), "block {} should be reserved", id);
        }
        assert!(bm.is_free(9).unwrap());
        assert_eq!(bm.count_free().unwrap(), 32768 - 9);
    }

    #[test]
    fn tail_bits_past_the_disk_are_never_handed_out() {
        let mut bm = small(100);
        assert_eq!(bm.count_free().unwrap(), 98);
        let mut seen = HashSet::new();
        while let Ok(id) = bm.alloc() {
            assert!((2..100).contains(&id), "unexpected block {}", id);
            assert!(seen.insert(id));
        }
        assert_eq!(seen.len(), 98);
    }

    #[test]
    fn consecutive_allocs_advance() {
        let mut bm = small(4096);
        let ids: Vec<_> = (0..40).map(|_| bm.alloc().unwrap()).collect();
        let expected: Vec<_> = (2..42).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn exhaustion_then_free_then_alloc() {
        let mut bm = small(64);
        let ids: Vec<_> = std::iter::from_fn(|| bm.alloc().ok()).collect();
        assert_eq!(ids.len(), 62);
        assert!(matches!(bm.alloc(), Err(FileSystemError::DiskFull)));

        bm.free(37).unwrap();
        assert_eq!(bm.alloc().unwrap(), 37);
        assert!(matches!(bm.alloc(), Err(FileSystemError::DiskFull)));
    }

    #[test]
    fn freed_block_reappears_exactly_once() {
        let mut bm = small(300);
        let first: Vec<_> = (0..50).map(|_| bm.alloc().unwrap()).collect();
        let victim = first[17];
        bm.free(victim).unwrap();
        assert!(bm.is_free(victim).unwrap());

        let rest: Vec<_> = std::iter::from_fn(|| bm.alloc().ok()).collect();
        assert_eq!(rest.iter().filter(|&&id| id == victim).count(), 1);

        let mut all: HashSet<_> = first.into_iter().collect();
        all.remove(&victim);
        for id in rest {
            assert!(all.insert(id), "block {} handed out twice", id);
        }
        assert_eq!(all.len(), 298);
    }

    #[test]
    fn metamap_tracks_full_words_across_groups() {
        let mut bm = small(3 * 4096);
        let total = bm.count_free().unwrap();
        let ids: Vec<_> = (0..total).map(|_| bm.alloc().unwrap()).collect();
        assert!(matches!(bm.alloc(), Err(FileSystemError::DiskFull)));

        // 每组各放回一个块，都应该能被找到
        let back = [100, 4096 + 7, 2 * 4096 + 4000];
        for id in back {
            bm.free(id).unwrap();
        }
        let mut again: Vec<_> = (0..3).map(|_| bm.alloc().unwrap()).collect();
        again.sort_unstable();
        assert_eq!(again, back);
        assert_eq!(ids.len() as u32, total);
    }

    #[test]
    fn reserved_and_out_of_range_ids_cannot_be_freed() {
        let mut bm = small(64);
        assert!(matches!(bm.free(0), Err(FileSystemError::OutOfRange(0))));
        assert!(matches!(bm.free(1), Err(FileSystemError::OutOfRange(1))));
        assert!(matches!(bm.free(64), Err(FileSystemError::OutOfRange(64))));
    }

    #[test]
    fn cursor_is_persisted_in_the_superblock() {
        let mut bm = small(3 * 4096);
        // 用满第 0 组
        let first_group = 4096 - 4;
        for _ in 0..first_group {
            bm.alloc().unwrap();
        }
        let id = bm.alloc().unwrap();
        assert_eq!(id, 4096);

        let sb = bm.load::<SuperBlock>(SUPER_BLOCK_ID).unwrap();
        assert_eq!(sb.cursor_group, 1);
        assert_eq!(sb.cursor_word, 0);
    }

    #[test]
    fn raw_blocks_pass_straight_through() {
        let mut bm = small(256);
        let id = bm.alloc().unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = (i * 7) as u8;
        }
        bm.write_block(id, &buf);

        let mut out = [0u8; BLOCK_SIZE];
        bm.read_block(id, &mut out);
        assert_eq!(out, buf);
        // 原始读写不碰位图
        assert!(!bm.is_free(id).unwrap());
        assert_eq!(bm.count_free().unwrap(), 256 - 2 - 1);

        // 越界的块号静默忽略
        bm.write_block(256, &[0xFF; BLOCK_SIZE]);
        let mut untouched = [0x5Au8; BLOCK_SIZE];
        bm.read_block(256, &mut untouched);
        assert!(untouched.iter().all(|&b| b == 0x5A));
    }
}
