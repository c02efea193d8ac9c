//! # 块存储服务
//!
//! inode 层本身不加锁，这里用一把全局互斥锁把它包起来，
//! 对外提供按 inum 索引的 `create / get / put / getattr / remove`。

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    disk::{BlockDevice, MemDisk},
    fs::{Attr, FsOptions, InodeManager, InodeType, Inum, Result},
};

#[derive(Debug)]
pub struct ExtentServer<D: BlockDevice = MemDisk> {
    im: Mutex<InodeManager<D>>,
}

impl ExtentServer<MemDisk> {
    pub fn new(options: FsOptions) -> Result<Self> {
        Ok(Self::from_manager(InodeManager::new(options)?))
    }
}

impl<D: BlockDevice> ExtentServer<D> {
    pub fn from_manager(im: InodeManager<D>) -> Self {
        Self { im: Mutex::new(im) }
    }

    pub fn create(&self, inode_type: InodeType) -> Result<Inum> {
        self.engine().create(inode_type)
    }

    pub fn get(&self, inum: Inum) -> Result<Vec<u8>> {
        self.engine().read(inum)
    }

    pub fn put(&self, inum: Inum, bytes: &[u8]) -> Result<()> {
        self.engine().write(inum, bytes)
    }

    pub fn getattr(&self, inum: Inum) -> Result<Attr> {
        self.engine().getattr(inum)
    }

    pub fn remove(&self, inum: Inum) -> Result<()> {
        self.engine().remove(inum)
    }

    /// 剩余空闲块数
    pub fn free_blocks(&self) -> Result<u32> {
        self.engine().block_manager().count_free()
    }

    pub fn total_blocks(&self) -> u32 {
        self.engine().block_manager().nblocks()
    }

    // 每次调用要么做完要么在改动前失败，锁中毒时数据仍然一致，直接接着用
    fn engine(&self) -> MutexGuard<'_, InodeManager<D>> {
        self.im.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
