//! # 目录客户端
//!
//! 在块存储服务之上实现目录树：目录文件的内容就是序列化后的 [`Directory`]，
//! 空内容视为空目录。所有修改都先拿到被修改 inum 的锁，再做读-改-写。

use std::sync::Arc;

use crate::{
    disk::{BlockDevice, MemDisk},
    extent::ExtentServer,
    fs::{
        config::MAX_FILE_SIZE, Attr, DirEntry, Directory, FileSystemError, InodeType, Inum,
        Result, ROOT_INUM,
    },
    lock::LockClient,
};

#[derive(Debug)]
pub struct YfsClient<D: BlockDevice = MemDisk> {
    extent: Arc<ExtentServer<D>>,
    locks: LockClient,
}

impl<D: BlockDevice> YfsClient<D> {
    /// 连接到块存储服务；根目录还是空文件时写入一个空目录
    pub fn new(extent: Arc<ExtentServer<D>>, locks: LockClient) -> Result<Self> {
        let client = Self { extent, locks };
        {
            let _guard = client.locks.guard(ROOT_INUM);
            let attr = client.extent.getattr(ROOT_INUM)?;
            if attr.inode_type != InodeType::Directory {
                return Err(FileSystemError::Corrupted(
                    "root inode is not a directory".to_string(),
                ));
            }
            if attr.size == 0 {
                client.extent.put(ROOT_INUM, &Directory::new().to_bytes()?)?;
            }
        }
        Ok(client)
    }

    pub fn extent(&self) -> &Arc<ExtentServer<D>> {
        &self.extent
    }

    pub fn lookup(&self, parent: Inum, name: &str) -> Result<Option<Inum>> {
        Ok(self.load_dir(parent)?.find(name))
    }

    pub fn create(&self, parent: Inum, name: &str) -> Result<Inum> {
        self.add_entry(parent, name, InodeType::File, &[])
    }

    pub fn mkdir(&self, parent: Inum, name: &str) -> Result<Inum> {
        self.add_entry(parent, name, InodeType::Directory, &[])
    }

    pub fn symlink(&self, parent: Inum, name: &str, target: &str) -> Result<Inum> {
        if target.is_empty() {
            return Err(FileSystemError::InvalidPath(target.to_string()));
        }
        self.add_entry(parent, name, InodeType::Symlink, target.as_bytes())
    }

    pub fn readlink(&self, inum: Inum) -> Result<String> {
        if self.extent.getattr(inum)?.inode_type != InodeType::Symlink {
            return Err(FileSystemError::InvalidPath(format!(
                "{:#x} is not a symlink",
                inum
            )));
        }
        String::from_utf8(self.extent.get(inum)?)
            .map_err(|_| FileSystemError::Corrupted(format!("symlink {:#x} is not utf-8", inum)))
    }

    /// 目录项列表，子目录在前，同类按名字排序
    pub fn readdir(&self, dir: Inum) -> Result<Vec<DirEntry>> {
        Ok(self.load_dir(dir)?.list_sorted())
    }

    /// 从 `off` 开始读至多 `size` 字节，读到文件末尾就截断
    pub fn read(&self, inum: Inum, size: usize, off: usize) -> Result<Vec<u8>> {
        let content = self.extent.get(inum)?;
        if off >= content.len() {
            return Ok(Vec::new());
        }
        let end = off.saturating_add(size).min(content.len());
        Ok(content[off..end].to_vec())
    }

    /// 在 `off` 处写入 `data`，写在文件末尾之后时中间补零。返回写入的字节数。
    pub fn write(&self, inum: Inum, off: usize, data: &[u8]) -> Result<usize> {
        let end = fit(off.saturating_add(data.len()))?;
        let _guard = self.locks.guard(inum);
        let mut content = self.extent.get(inum)?;
        if content.len() < end {
            content.resize(end, 0);
        }
        content[off..end].copy_from_slice(data);
        self.extent.put(inum, &content)?;
        Ok(data.len())
    }

    /// 截断或补零到 `size` 字节
    pub fn setattr(&self, inum: Inum, size: usize) -> Result<()> {
        fit(size)?;
        let _guard = self.locks.guard(inum);
        let mut content = self.extent.get(inum)?;
        if content.len() != size {
            content.resize(size, 0);
            self.extent.put(inum, &content)?;
        }
        Ok(())
    }

    /// 删除目录项及其文件；非空目录拒绝删除。
    ///
    /// 先锁父目录再锁被删的文件，判空和删除都在两把锁内完成，
    /// 别人不可能在这中间往子目录里添加文件。
    pub fn unlink(&self, parent: Inum, name: &str) -> Result<()> {
        let _parent_guard = self.locks.guard(parent);
        let mut dir = self.load_dir(parent)?;
        let entry = dir
            .get(name)
            .cloned()
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;

        let _child_guard = self.locks.guard(entry.inum);
        if entry.entry_type == InodeType::Directory && !self.load_dir(entry.inum)?.is_empty() {
            return Err(FileSystemError::DirectoryNotEmpty(name.to_string()));
        }

        dir.remove(name);
        self.extent.put(parent, &dir.to_bytes()?)?;
        self.extent.remove(entry.inum)?;
        log::debug!(
            "client {}: unlink {} ({:#x}) from {:#x}",
            self.locks.id(),
            name,
            entry.inum,
            parent
        );
        Ok(())
    }

    pub fn getattr(&self, inum: Inum) -> Result<Attr> {
        self.extent.getattr(inum)
    }

    pub fn is_dir(&self, inum: Inum) -> bool {
        self.is_type(inum, InodeType::Directory)
    }

    pub fn is_file(&self, inum: Inum) -> bool {
        self.is_type(inum, InodeType::File)
    }

    pub fn is_symlink(&self, inum: Inum) -> bool {
        self.is_type(inum, InodeType::Symlink)
    }

    /// 从根目录开始解析绝对路径。`.` 和 `..` 按字面处理，不跟随符号链接。
    pub fn resolve(&self, path: &str) -> Result<Inum> {
        if !path.starts_with('/') {
            return Err(FileSystemError::InvalidPath(path.to_string()));
        }

        let mut stack = vec![ROOT_INUM];
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                name => {
                    let current = *stack.last().unwrap_or(&ROOT_INUM);
                    let dir = self.load_dir(current).map_err(|e| match e {
                        FileSystemError::NotADirectory(_) => {
                            FileSystemError::NotADirectory(path.to_string())
                        }
                        other => other,
                    })?;
                    let inum = dir
                        .find(name)
                        .ok_or_else(|| FileSystemError::NotFound(path.to_string()))?;
                    stack.push(inum);
                }
            }
        }
        Ok(*stack.last().unwrap_or(&ROOT_INUM))
    }

    /// 剩余空闲块数
    pub fn free_blocks(&self) -> Result<u32> {
        self.extent.free_blocks()
    }

    fn add_entry(
        &self,
        parent: Inum,
        name: &str,
        inode_type: InodeType,
        content: &[u8],
    ) -> Result<Inum> {
        check_name(name)?;
        let _guard = self.locks.guard(parent);
        let mut dir = self.load_dir(parent)?;
        if dir.find(name).is_some() {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }

        let inum = self.extent.create(inode_type)?;
        if let Err(e) = self.link(parent, &mut dir, name, inum, inode_type, content) {
            // 没挂上目录树的文件立即回收
            if let Err(undo) = self.extent.remove(inum) {
                log::error!("failed to reclaim orphan {:#x}: {}", inum, undo);
            }
            return Err(e);
        }

        log::debug!(
            "client {}: {:?} {} ({:#x}) in {:#x}",
            self.locks.id(),
            inode_type,
            name,
            inum,
            parent
        );
        Ok(inum)
    }

    fn link(
        &self,
        parent: Inum,
        dir: &mut Directory,
        name: &str,
        inum: Inum,
        inode_type: InodeType,
        content: &[u8],
    ) -> Result<()> {
        if !content.is_empty() {
            self.extent.put(inum, content)?;
        }
        dir.add(inum, name, inode_type)?;
        self.extent.put(parent, &dir.to_bytes()?)
    }

    fn load_dir(&self, inum: Inum) -> Result<Directory> {
        if self.extent.getattr(inum)?.inode_type != InodeType::Directory {
            return Err(FileSystemError::NotADirectory(format!("{:#x}", inum)));
        }
        Directory::load_from_bytes(&self.extent.get(inum)?)
    }

    fn is_type(&self, inum: Inum, inode_type: InodeType) -> bool {
        match self.extent.getattr(inum) {
            Ok(attr) => attr.inode_type == inode_type,
            Err(e) => {
                log::debug!("getattr {:#x}: {}", inum, e);
                false
            }
        }
    }
}

// 先挡住超长的请求，免得在内存里补出一大段零
fn fit(size: usize) -> Result<usize> {
    if size > MAX_FILE_SIZE {
        return Err(FileSystemError::FileTooLarge {
            size,
            max: MAX_FILE_SIZE,
        });
    }
    Ok(size)
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FileSystemError::InvalidPath(name.to_string()));
    }
    Ok(())
}
