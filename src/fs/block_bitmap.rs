use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BlockId, Record},
    fs::{
        codec,
        config::{BITS_PER_MAP, MAP_START_BLOCK_ID, MAP_WORDS, META_WORDS},
        error::Result,
    },
};

/// 位图块：每一位对应一个块，1 = 空闲，0 = 已用。
///
/// 128 个字按元位图的分组存放（4 组 × 32 字），整块 512 字节没有头部。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBlock {
    words: [[u32; 32]; META_WORDS],
}

impl MapBlock {
    /// 全部置 1（全部空闲）
    pub fn fill(&mut self) {
        self.words = [[u32::MAX; 32]; META_WORDS];
    }

    #[inline]
    pub fn word(&self, word: usize) -> u32 {
        self.words[word / 32][word % 32]
    }

    #[inline]
    pub fn word_mut(&mut self, word: usize) -> &mut u32 {
        &mut self.words[word / 32][word % 32]
    }

    pub fn count_free(&self) -> u32 {
        self.words.iter().flatten().map(|w| w.count_ones()).sum()
    }
}

impl Record for MapBlock {
    fn decode(buf: &Block) -> Result<Self> {
        codec::decode_raw(buf)
    }

    fn encode(&self, buf: &mut Block) -> Result<()> {
        codec::encode_raw(self, buf)
    }
}

/// 块号在位图中的位置：第几组（位图块）、组内第几个字、字内第几位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPos {
    pub group: u32,
    pub word: usize,
    pub bit: u32,
}

impl BitPos {
    #[inline]
    pub fn of(block_id: BlockId) -> Self {
        Self {
            group: block_id / BITS_PER_MAP,
            word: (block_id / 32) as usize % MAP_WORDS,
            bit: block_id % 32,
        }
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.group * BITS_PER_MAP + self.word as u32 * 32 + self.bit
    }
}

/// 第 `group` 组位图所在的块
#[inline]
pub fn map_block_id(group: u32) -> BlockId {
    MAP_START_BLOCK_ID + group
}

const DE_BRUIJN: u32 = 0x077C_B531;

const DE_BRUIJN_POS: [u32; 32] = [
    0, 1, 28, 2, 29, 14, 24, 3, 30, 22, 20, 15, 25, 17, 4, 8, //
    31, 27, 13, 23, 21, 19, 16, 7, 26, 12, 18, 6, 11, 5, 10, 9,
];

/// 最低置位的下标，常数时间。
///
/// `word & -word` 只留下最低位，乘以 de Bruijn 常数后高 5 位各不相同，查表即得位置。
/// `word` 为 0 时结果无意义，调用方先判非零。
#[inline]
pub fn lowest_set_bit(word: u32) -> u32 {
    let lowest = word & word.wrapping_neg();
    DE_BRUIJN_POS[(lowest.wrapping_mul(DE_BRUIJN) >> 27) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::BLOCK_SIZE;

    #[test]
    fn de_bruijn_matches_trailing_zeros() {
        for bit in 0..32 {
            assert_eq!(lowest_set_bit(1 << bit), bit);
        }
        for word in [
            u32::MAX,
            0x8000_0001,
            0xF0F0_F0F0,
            0x0001_0000,
            0x1234_5678,
            0xFFFF_0000,
            0x0000_0600,
        ] {
            assert_eq!(lowest_set_bit(word), word.trailing_zeros());
        }
    }

    #[test]
    fn bit_position_round_trips() {
        for id in [0, 1, 31, 32, 4095, 4096, 4097, 32767] {
            assert_eq!(BitPos::of(id).block_id(), id);
        }
        let pos = BitPos::of(4096 + 33 * 32 + 5);
        assert_eq!(pos, BitPos { group: 1, word: 33, bit: 5 });
    }

    #[test]
    fn map_block_fills_a_whole_block() {
        let mut map = MapBlock::default();
        map.fill();
        *map.word_mut(127) = 0b1010;
        assert_eq!(map.count_free(), 127 * 32 + 2);

        let mut buf = [0u8; BLOCK_SIZE];
        map.encode(&mut buf).unwrap();
        assert_eq!(&buf[508..], &0b1010u32.to_le_bytes());
        assert_eq!(MapBlock::decode(&buf).unwrap(), map);
    }
}
