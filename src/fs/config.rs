use std::time::Duration;

use crate::disk::{BlockId, BLOCK_NUM, BLOCK_SIZE};

/// 对外可见的文件编号：低 32 位是 inode 序号，高 32 位是代号（generation）
pub type Inum = u64;

pub const SUPER_BLOCK_ID: BlockId = 0;
// 位图块紧跟在超级块后面：1..=nmaps
pub const MAP_START_BLOCK_ID: BlockId = 1;

// 每个位图块有多少个 u32 字
pub const MAP_WORDS: usize = BLOCK_SIZE / 4;
// 元位图每组的字数：一位对应位图块中的一个字
pub const META_WORDS: usize = MAP_WORDS / 32;
// 每个位图块管理的块数
pub const BITS_PER_MAP: u32 = (BLOCK_SIZE * 8) as u32;
// 超级块最多能登记的位图块数量
pub const MAX_MAPS: u32 = 29;

// inode 与 jnode 内嵌的数据段长度
pub const NDATA_MIXED: usize = 256;
// knode 整块都是数据
pub const NDATA_FULL: usize = BLOCK_SIZE;

// 记录头部（元数据）预留的字节数
const INODE_HEADER_BYTES: usize = 128;
const JNODE_HEADER_BYTES: usize = 32;

// inode 最多指向多少个 jnode
pub const NMAP_I: usize = (BLOCK_SIZE - NDATA_MIXED - INODE_HEADER_BYTES) / 4;
// jnode 最多指向多少个 knode
pub const NMAP_J: usize = (BLOCK_SIZE - NDATA_MIXED - JNODE_HEADER_BYTES) / 4;

// 一个满的 jnode 连同其下全部 knode 承载的字节数
pub const JNODE_SPAN: usize = NDATA_MIXED + NMAP_J * NDATA_FULL;
pub const MAX_FILE_SIZE: usize = NDATA_MIXED + NMAP_I * JNODE_SPAN;

// 根目录固定为 1 号，代号为 0
pub const ROOT_INUM: Inum = 1;
pub const ROOT_GENERATION: u32 = 0;

// 锁租约与重试间隔
pub const LOCK_LEASE: Duration = Duration::from_secs(10);
pub const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// 对失效 inum 执行删除时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// 返回 `StaleHandle` 错误
    #[default]
    Reject,
    /// 记一条警告后当作成功
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsOptions {
    pub block_count: u32,
    pub stale_policy: StalePolicy,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            block_count: BLOCK_NUM,
            stale_policy: StalePolicy::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry() {
        assert_eq!(MAP_WORDS, 128);
        assert_eq!(META_WORDS, 4);
        assert_eq!(BITS_PER_MAP, 4096);
        assert_eq!(NMAP_I, 32);
        assert_eq!(NMAP_J, 56);
        assert_eq!(MAX_FILE_SIZE, 925_952);
        assert_eq!(BLOCK_NUM, 32768);
        assert_eq!(BLOCK_NUM.div_ceil(BITS_PER_MAP), 8);
    }
}
