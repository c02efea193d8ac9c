use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::fs::{
    config::Inum,
    error::{FileSystemError, Result},
    inode::InodeType,
};

// 一个目录项
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inum: Inum,
    pub entry_type: InodeType,
}

// 目录结构：目录文件的内容就是序列化后的 entries
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Directory {
    pub entries: Vec<DirEntry>,
    #[serde(skip)]
    pub index_map: HashMap<String, usize>, // name -> entries 索引
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    // 从字节数组加载目录，自动重建 index_map；空内容就是空目录
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let mut dir: Directory = bincode::deserialize(bytes)?;
        dir.rebuild_index_map();
        Ok(dir)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn rebuild_index_map(&mut self) {
        self.index_map.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.index_map.insert(entry.name.clone(), i);
        }
    }

    // 添加目录项
    pub fn add(&mut self, inum: Inum, name: &str, entry_type: InodeType) -> Result<()> {
        if self.index_map.contains_key(name) {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }
        self.entries.push(DirEntry {
            name: name.to_string(),
            inum,
            entry_type,
        });
        self.index_map
            .insert(name.to_string(), self.entries.len() - 1);
        Ok(())
    }

    // 删除目录项，返回被删掉的项
    pub fn remove(&mut self, name: &str) -> Option<DirEntry> {
        let idx = *self.index_map.get(name)?;
        let entry = self.entries.remove(idx);
        self.rebuild_index_map();
        Some(entry)
    }

    // 查找目录项，返回 inum
    pub fn find(&self, name: &str) -> Option<Inum> {
        self.get(name).map(|entry| entry.inum)
    }

    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.index_map.get(name).map(|&idx| &self.entries[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // 目录排在前面，同类按名字排序
    pub fn list_sorted(&self) -> Vec<DirEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| {
            let a_dir = a.entry_type == InodeType::Directory;
            let b_dir = b.entry_type == InodeType::Directory;
            b_dir.cmp(&a_dir).then_with(|| a.name.cmp(&b.name))
        });
        entries
    }
}
