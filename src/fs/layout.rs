use std::ops::Range;

use crate::fs::{
    config::{JNODE_SPAN, MAX_FILE_SIZE, NDATA_FULL, NDATA_MIXED, NMAP_I, NMAP_J},
    error::{FileSystemError, Result},
};

/// 给定文件大小时 inode 树的形状。
///
/// 字节流依次落在：inode 内嵌段、jnode 0 内嵌段、jnode 0 下的 knode 0..k、
/// jnode 1 内嵌段……除最后一个 jnode 外，每个 jnode 下都挂满 `NMAP_J` 个 knode。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    size: usize,
    njnode: usize,
    last_knodes: usize,
}

impl Layout {
    pub fn for_size(size: usize) -> Result<Self> {
        let rest = size.saturating_sub(NDATA_MIXED);
        let njnode = rest.div_ceil(JNODE_SPAN);
        if njnode > NMAP_I {
            return Err(FileSystemError::FileTooLarge {
                size,
                max: MAX_FILE_SIZE,
            });
        }

        let last_knodes = match njnode {
            0 => 0,
            n => {
                let last_rest = rest - (n - 1) * JNODE_SPAN;
                last_rest.saturating_sub(NDATA_MIXED).div_ceil(NDATA_FULL)
            }
        };

        Ok(Self {
            size,
            njnode,
            last_knodes,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn njnode(&self) -> usize {
        self.njnode
    }

    pub fn nknode(&self) -> usize {
        match self.njnode {
            0 => 0,
            n => (n - 1) * NMAP_J + self.last_knodes,
        }
    }

    /// 第 `j` 个 jnode 下挂的 knode 数
    pub fn knodes_under(&self, j: usize) -> usize {
        if j + 1 < self.njnode {
            NMAP_J
        } else if j + 1 == self.njnode {
            self.last_knodes
        } else {
            0
        }
    }

    /// inode 内嵌段在文件中的字节区间
    pub fn inline(&self) -> Range<usize> {
        self.clip(0, NDATA_MIXED)
    }

    pub fn jnode_inline(&self, j: usize) -> Range<usize> {
        self.clip(NDATA_MIXED + j * JNODE_SPAN, NDATA_MIXED)
    }

    pub fn knode(&self, j: usize, k: usize) -> Range<usize> {
        let start = NDATA_MIXED + j * JNODE_SPAN + NDATA_MIXED + k * NDATA_FULL;
        self.clip(start, NDATA_FULL)
    }

    fn clip(&self, start: usize, len: usize) -> Range<usize> {
        start.min(self.size)..(start + len).min(self.size)
    }
}
