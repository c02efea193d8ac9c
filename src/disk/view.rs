//! # 块视图
//!
//! 把一个块读进自己持有的缓冲区，按某种记录类型解码后交给调用方使用；
//! 视图释放时（包括提前返回、`?` 传播错误的路径），
//! 若以 [`Access::WRITE_BACK`] 打开，就把记录重新编码写回同一个块。
//!
//! 视图独占设备的可变借用，所以同一时刻最多只有一个视图打开，
//! 也就不可能出现同一块的两个可写视图。需要改多个块时，按顺序逐个打开。

use std::{
    mem,
    ops::{Deref, DerefMut},
};

use bitflags::bitflags;

use crate::{
    disk::{
        block_device::BlockDevice,
        types::{Block, BlockId, BLOCK_SIZE},
    },
    fs::error::Result,
};

bitflags! {
    /// 视图的打开方式
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// 打开时立即从磁盘读取并解码
        const LOAD = 0b01;
        /// 释放时编码并写回
        const WRITE_BACK = 0b10;
        const READ_WRITE = Self::LOAD.bits() | Self::WRITE_BACK.bits();
    }
}

/// 能放进一个块的定长记录
pub trait Record: Default {
    fn decode(buf: &Block) -> Result<Self>;
    fn encode(&self, buf: &mut Block) -> Result<()>;
}

pub struct BlockView<'a, D: BlockDevice + ?Sized, T: Record> {
    device: &'a mut D,
    block_id: BlockId,
    record: T,
    access: Access,
}

impl<'a, D: BlockDevice + ?Sized, T: Record> BlockView<'a, D, T> {
    pub fn open(device: &'a mut D, block_id: BlockId, access: Access) -> Result<Self> {
        let record = if access.contains(Access::LOAD) {
            let mut buf = [0u8; BLOCK_SIZE];
            device.read_block(block_id, &mut buf);
            T::decode(&buf)?
        } else {
            T::default()
        };

        Ok(Self {
            device,
            block_id,
            record,
            access,
        })
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// 取出记录，放弃写回
    pub fn into_record(mut self) -> T {
        self.access.remove(Access::WRITE_BACK);
        mem::take(&mut self.record)
    }
}

impl<D: BlockDevice + ?Sized, T: Record> Deref for BlockView<'_, D, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

impl<D: BlockDevice + ?Sized, T: Record> DerefMut for BlockView<'_, D, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.record
    }
}

impl<D: BlockDevice + ?Sized, T: Record> Drop for BlockView<'_, D, T> {
    fn drop(&mut self) {
        if !self.access.contains(Access::WRITE_BACK) {
            return;
        }

        let mut buf = [0u8; BLOCK_SIZE];
        match self.record.encode(&mut buf) {
            Ok(()) => self.device.write_block(self.block_id, &buf),
            Err(e) => log::error!("block {}: write-back dropped: {}", self.block_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    #[derive(Debug, Default, PartialEq)]
    struct Counter(u32);

    impl Record for Counter {
        fn decode(buf: &Block) -> Result<Self> {
            Ok(Self(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])))
        }

        fn encode(&self, buf: &mut Block) -> Result<()> {
            buf[..4].copy_from_slice(&self.0.to_le_bytes());
            Ok(())
        }
    }

    fn bump(disk: &mut MemDisk, fail: bool) -> Result<()> {
        let mut view = BlockView::<_, Counter>::open(disk, 3, Access::READ_WRITE)?;
        view.0 += 1;
        if fail {
            return Err(crate::fs::error::FileSystemError::DiskFull);
        }
        Ok(())
    }

    #[test]
    fn writes_back_on_every_exit_path() {
        let mut disk = MemDisk::new(8);
        bump(&mut disk, false).unwrap();
        assert!(bump(&mut disk, true).is_err());

        let view = BlockView::<_, Counter>::open(&mut disk, 3, Access::LOAD).unwrap();
        assert_eq!(*view, Counter(2));
    }

    #[test]
    fn load_only_view_discards_changes() {
        let mut disk = MemDisk::new(8);
        {
            let mut view = BlockView::<_, Counter>::open(&mut disk, 1, Access::LOAD).unwrap();
            view.0 = 99;
        }
        let counter = BlockView::<_, Counter>::open(&mut disk, 1, Access::LOAD)
            .unwrap()
            .into_record();
        assert_eq!(counter, Counter(0));
    }

    #[test]
    fn write_back_without_load_starts_from_default() {
        let mut disk = MemDisk::new(8);
        disk.write_block(5, &[0xFF; BLOCK_SIZE]);
        {
            let mut view = BlockView::<_, Counter>::open(&mut disk, 5, Access::WRITE_BACK).unwrap();
            assert_eq!(view.block_id(), 5);
            view.0 = 7;
        }

        let mut raw = [0u8; BLOCK_SIZE];
        disk.read_block(5, &mut raw);
        assert_eq!(&raw[..4], &7u32.to_le_bytes());
        // 整块按编码结果覆盖
        assert!(raw[4..].iter().all(|&b| b == 0));
    }
}
