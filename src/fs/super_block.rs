use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, Record, BLOCK_SIZE},
    fs::{
        codec::{self, RecordKind},
        config::META_WORDS,
        error::{FileSystemError, Result},
    },
};

/// 超级块（0 号块）
///
/// 除了磁盘的基本信息，还保存两样分配器要用的东西：
/// - 扫描游标 `(cursor_group, cursor_word)`：下一次找空闲块从这里接着找；
/// - 元位图 `metamap[group][word]`：每一位对应一个位图字，
///   该位图字里还有空闲位时置 1。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub size: u64,    // 磁盘总字节数
    pub nblocks: u32, // 总块数
    pub nmaps: u32,   // 位图块数量
    pub cursor_group: u32,
    pub cursor_word: u32,
    pub metamap: Vec<[u32; META_WORDS]>,
}

impl SuperBlock {
    /// 新格式化的超级块：所有元位图位都置 1
    pub fn new(nblocks: u32, nmaps: u32) -> Self {
        Self {
            size: nblocks as u64 * BLOCK_SIZE as u64,
            nblocks,
            nmaps,
            cursor_group: 0,
            cursor_word: 0,
            metamap: vec![[u32::MAX; META_WORDS]; nmaps as usize],
        }
    }

    /// 位图字 `word` 还有空闲位：置元位图
    #[inline]
    pub fn set_meta(&mut self, group: u32, word: usize) {
        self.metamap[group as usize][word / 32] |= 1 << (word % 32);
    }

    /// 位图字 `word` 已经用满：清元位图
    #[inline]
    pub fn clear_meta(&mut self, group: u32, word: usize) {
        self.metamap[group as usize][word / 32] &= !(1 << (word % 32));
    }
}

impl Record for SuperBlock {
    fn decode(buf: &Block) -> Result<Self> {
        let sb: SuperBlock = codec::decode_record(RecordKind::SuperBlock, buf)?;
        if sb.metamap.len() != sb.nmaps as usize {
            return Err(FileSystemError::Corrupted(format!(
                "superblock lists {} map blocks but carries {} metamap groups",
                sb.nmaps,
                sb.metamap.len()
            )));
        }
        Ok(sb)
    }

    fn encode(&self, buf: &mut Block) -> Result<()> {
        codec::encode_record(RecordKind::SuperBlock, self, buf)
    }
}
