//! # inode 层
//!
//! 每个文件的根是一个 inode 块，下面挂 jnode，jnode 下面再挂 knode，
//! 树的形状完全由文件大小决定（见 [`Layout`]）。
//!
//! inum 的低 32 位是 inode 序号：`块号 = 序号 + nmaps`，所以第一个可分配的块
//! 正好是 1 号；高 32 位是分配时随机生成的代号。每次访问都重新计算校验值，
//! 对不上就说明这个 inum 已经失效。

use std::mem;

use crate::{
    disk::{Access, BlockDevice, BlockId, MemDisk, BLOCK_SIZE},
    fs::{
        block_manager::BlockManager,
        config::{FsOptions, Inum, StalePolicy, ROOT_GENERATION, ROOT_INUM},
        error::{FileSystemError, Result},
        inode::{checksums, compose_inum, split_inum, Attr, Inode, InodeType, Jnode, Knode},
        layout::Layout,
    },
    utils::{current_timestamp, generation_tag},
};

#[derive(Debug)]
pub struct InodeManager<D: BlockDevice = MemDisk> {
    bm: BlockManager<D>,
    options: FsOptions,
}

impl InodeManager<MemDisk> {
    /// 在一块新的内存磁盘上格式化，并建好根目录
    pub fn new(options: FsOptions) -> Result<Self> {
        Self::with_device(MemDisk::new(options.block_count), options)
    }
}

impl<D: BlockDevice> InodeManager<D> {
    pub fn with_device(device: D, options: FsOptions) -> Result<Self> {
        let bm = BlockManager::format(device)?;
        let mut im = Self { bm, options };

        let root = im.alloc_inode(InodeType::Directory, ROOT_GENERATION)?;
        if root != ROOT_INUM {
            return Err(FileSystemError::Corrupted(format!(
                "root directory allocated as {:#x}, expected {}",
                root, ROOT_INUM
            )));
        }
        Ok(im)
    }

    pub fn block_manager(&mut self) -> &mut BlockManager<D> {
        &mut self.bm
    }

    /// 新建一个文件，返回其 inum
    pub fn create(&mut self, inode_type: InodeType) -> Result<Inum> {
        // 代号 0 留给根目录
        let generation = loop {
            let tag = generation_tag();
            if tag != ROOT_GENERATION {
                break tag;
            }
        };
        self.alloc_inode(inode_type, generation)
    }

    pub fn getattr(&mut self, inum: Inum) -> Result<Attr> {
        let (_, inode) = self.load_inode(inum)?;
        Ok(inode.attr())
    }

    /// 校验过的 inode 副本
    pub fn inode(&mut self, inum: Inum) -> Result<Inode> {
        Ok(self.load_inode(inum)?.1)
    }

    /// 读出整个文件
    pub fn read(&mut self, inum: Inum) -> Result<Vec<u8>> {
        let (block_id, inode) = self.load_inode(inum)?;
        let size = inode.size as usize;
        let layout = Layout::for_size(size)?;
        if layout.njnode() != inode.jmap.len() {
            return Err(FileSystemError::Corrupted(format!(
                "inode {:#x}: {} bytes need {} jnodes, found {}",
                inum,
                size,
                layout.njnode(),
                inode.jmap.len()
            )));
        }

        let jnodes = self.load_jnodes(inum, &inode.jmap)?;
        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&inode.data);
        for jnode in &jnodes {
            out.extend_from_slice(&jnode.data);
            for &knode_id in &jnode.kmap {
                let knode = self.bm.view::<Knode>(knode_id, Access::LOAD)?;
                let take = size.saturating_sub(out.len()).min(knode.data.len());
                out.extend_from_slice(&knode.data[..take]);
            }
        }

        if out.len() != size {
            return Err(FileSystemError::Corrupted(format!(
                "inode {:#x}: read {} bytes, size says {}",
                inum,
                out.len(),
                size
            )));
        }

        let mut view = self.bm.view::<Inode>(block_id, Access::READ_WRITE)?;
        view.atime = current_timestamp();
        Ok(out)
    }

    /// 用 `bytes` 整体替换文件内容，更新 size、mtime、atime；ctime 是创建时间，不动。
    ///
    /// 要么完整成功，要么什么都不改：先算出新形状（过大直接返回），
    /// 再一次性分配所有新块（磁盘不够就把刚分配的还回去），最后才改动树。
    pub fn write(&mut self, inum: Inum, bytes: &[u8]) -> Result<()> {
        let layout = Layout::for_size(bytes.len())?;
        let (block_id, mut inode) = self.load_inode(inum)?;

        let mut kmaps: Vec<_> = self
            .load_jnodes(inum, &inode.jmap)?
            .into_iter()
            .map(|jnode| jnode.kmap)
            .collect();

        let need_jnodes = layout.njnode().saturating_sub(inode.jmap.len());
        let need_knodes: usize = (0..layout.njnode())
            .map(|j| {
                let have = kmaps.get(j).map_or(0, Vec::len);
                layout.knodes_under(j).saturating_sub(have)
            })
            .sum();
        let mut fresh = self.alloc_many(need_jnodes + need_knodes)?.into_iter();
        let mut next_fresh = || {
            fresh
                .next()
                .ok_or_else(|| FileSystemError::Corrupted("ran out of pre-allocated blocks".into()))
        };

        let mut released = Vec::new();
        let mut jmap = Vec::with_capacity(layout.njnode());
        for j in 0..layout.njnode() {
            let jnode_id = match inode.jmap.get(j) {
                Some(&id) => id,
                None => next_fresh()?,
            };

            let mut kmap = kmaps.get_mut(j).map(mem::take).unwrap_or_default();
            let want = layout.knodes_under(j);
            if kmap.len() > want {
                released.extend(kmap.drain(want..));
            }
            while kmap.len() < want {
                kmap.push(next_fresh()?);
            }

            for (k, &knode_id) in kmap.iter().enumerate() {
                let range = layout.knode(j, k);
                let mut knode = self.bm.view::<Knode>(knode_id, Access::WRITE_BACK)?;
                knode.data[..range.len()].copy_from_slice(&bytes[range]);
            }

            let mut jnode = self.bm.view::<Jnode>(jnode_id, Access::WRITE_BACK)?;
            jnode.kmap = kmap;
            jnode.data = bytes[layout.jnode_inline(j)].to_vec();
            jmap.push(jnode_id);
        }

        // 多出来的 jnode 连同其下的 knode 一起释放
        for j in layout.njnode()..inode.jmap.len() {
            released.append(&mut kmaps[j]);
            released.push(inode.jmap[j]);
        }

        let now = current_timestamp();
        inode.size = bytes.len() as u64;
        inode.njnode = layout.njnode() as u32;
        inode.nknode = layout.nknode() as u32;
        inode.jmap = jmap;
        inode.data = bytes[layout.inline()].to_vec();
        inode.atime = now;
        inode.mtime = now;
        {
            let mut view = self.bm.view::<Inode>(block_id, Access::WRITE_BACK)?;
            *view = inode;
        }

        for id in released {
            self.bm.free(id)?;
        }

        log::debug!(
            "write {:#x}: {} bytes, {} jnodes, {} knodes",
            inum,
            layout.size(),
            layout.njnode(),
            layout.nknode()
        );
        Ok(())
    }

    /// 删除文件：依次释放 knode、jnode，清零 inode 后释放 inode 块
    pub fn remove(&mut self, inum: Inum) -> Result<()> {
        let (block_id, inode) = match self.load_inode(inum) {
            Err(FileSystemError::StaleHandle(_))
                if self.options.stale_policy == StalePolicy::Ignore =>
            {
                log::warn!("remove {:#x}: stale handle ignored", inum);
                return Ok(());
            }
            other => other?,
        };

        let knodes: Vec<_> = self
            .load_jnodes(inum, &inode.jmap)?
            .into_iter()
            .flat_map(|jnode| jnode.kmap)
            .collect();
        for knode_id in knodes {
            self.bm.free(knode_id)?;
        }
        for &jnode_id in &inode.jmap {
            self.bm.free(jnode_id)?;
        }

        // 清零后代号与校验值都不在了，旧 inum 再来访问会被识别出来
        self.bm.write_block(block_id, &[0; BLOCK_SIZE]);
        self.bm.free(block_id)?;

        log::debug!("remove {:#x}", inum);
        Ok(())
    }

    fn alloc_inode(&mut self, inode_type: InodeType, generation: u32) -> Result<Inum> {
        let block_id = self.bm.alloc()?;
        let index = block_id - self.bm.nmaps();
        let now = current_timestamp();

        let mut view = self.bm.view::<Inode>(block_id, Access::WRITE_BACK)?;
        *view = Inode {
            inode_type,
            atime: now,
            mtime: now,
            ctime: now,
            generation,
            checksums: checksums(index, generation),
            ..Inode::default()
        };

        let inum = compose_inum(index, generation);
        log::debug!("create {:?} {:#x} at block {}", inode_type, inum, block_id);
        Ok(inum)
    }

    /// 一次分配 `count` 个块；中途失败就把已分配的全部还回去
    fn alloc_many(&mut self, count: usize) -> Result<Vec<BlockId>> {
        let mut fresh = Vec::with_capacity(count);
        for _ in 0..count {
            match self.bm.alloc() {
                Ok(id) => fresh.push(id),
                Err(e) => {
                    for id in fresh {
                        self.bm.free(id)?;
                    }
                    return Err(e);
                }
            }
        }
        Ok(fresh)
    }

    /// 读出 `jmap` 指向的全部 jnode。树里的块号先查一遍，
    /// 落在超级块、位图块或磁盘之外就报 `Corrupted`，此时什么都还没改。
    fn load_jnodes(&mut self, inum: Inum, jmap: &[BlockId]) -> Result<Vec<Jnode>> {
        let mut jnodes = Vec::with_capacity(jmap.len());
        for &jnode_id in jmap {
            self.check_node(inum, jnode_id)?;
            let jnode = self.bm.load::<Jnode>(jnode_id)?;
            for &knode_id in &jnode.kmap {
                self.check_node(inum, knode_id)?;
            }
            jnodes.push(jnode);
        }
        Ok(jnodes)
    }

    fn check_node(&self, inum: Inum, block_id: BlockId) -> Result<()> {
        if block_id <= self.bm.nmaps() || block_id >= self.bm.nblocks() {
            return Err(FileSystemError::Corrupted(format!(
                "inode {:#x} points at block {} outside the data area",
                inum, block_id
            )));
        }
        Ok(())
    }

    fn block_of(&self, inum: Inum) -> Result<BlockId> {
        let (index, _) = split_inum(inum);
        let nmaps = self.bm.nmaps();
        if index == 0 || index >= self.bm.nblocks() - nmaps {
            return Err(FileSystemError::OutOfRange(inum));
        }
        Ok(index + nmaps)
    }

    /// 读 inode 并做代号校验
    fn load_inode(&mut self, inum: Inum) -> Result<(BlockId, Inode)> {
        let block_id = self.block_of(inum)?;
        let (index, generation) = split_inum(inum);

        let inode = match self.bm.load::<Inode>(block_id) {
            Ok(inode) => inode,
            Err(e) => {
                log::debug!("inum {:#x}: block {} is not an inode: {}", inum, block_id, e);
                return Err(FileSystemError::StaleHandle(inum));
            }
        };
        if inode.generation != generation || inode.checksums != checksums(index, inode.generation) {
            log::debug!("inum {:#x}: generation check failed", inum);
            return Err(FileSystemError::StaleHandle(inum));
        }
        Ok((block_id, inode))
    }
}
