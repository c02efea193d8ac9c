use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BlockId, Record, BLOCK_SIZE},
    fs::{
        codec::{self, RecordKind},
        config::{Inum, NDATA_FULL, NDATA_MIXED, NMAP_I, NMAP_J},
        error::{FileSystemError, Result},
    },
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum InodeType {
    Directory, // 目录
    #[default]
    File, // 文件
    Symlink,   // 符号链接，内容是目标路径
}

impl InodeType {
    /// 协议里的类型编号
    pub fn id(self) -> u32 {
        match self {
            Self::Directory => 1,
            Self::File => 2,
            Self::Symlink => 3,
        }
    }
}

/// 文件属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub inode_type: InodeType,
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// inode：文件的根块。
///
/// 内嵌文件最前面的 `NDATA_MIXED` 字节，并指向至多 `NMAP_I` 个 jnode。
/// `generation` 在分配时随机生成，`checksums` 由 `(序号, generation)` 算出，
/// 用来识别已经释放或被复用的 inum。
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Inode {
    pub inode_type: InodeType, // 文件类型
    pub size: u64,             // 文件大小（字节）
    pub atime: u64,            // 最后访问时间（Access Time）
    pub mtime: u64,            // 最后修改时间（Modify Time）
    pub ctime: u64,            // 创建时间（Create Time），写入不改
    pub njnode: u32,           // 已分配的 jnode 数
    pub nknode: u32,           // 已分配的 knode 总数
    pub generation: u32,
    pub checksums: [u32; 2],

    pub jmap: Vec<BlockId>, // jnode 块号，长度 == njnode
    pub data: Vec<u8>,      // 内嵌数据段
}

impl Inode {
    pub fn attr(&self) -> Attr {
        Attr {
            inode_type: self.inode_type,
            size: self.size,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }
}

impl Record for Inode {
    fn decode(buf: &Block) -> Result<Self> {
        let inode: Inode = codec::decode_record(RecordKind::Inode, buf)?;
        if inode.jmap.len() != inode.njnode as usize
            || inode.jmap.len() > NMAP_I
            || inode.data.len() > NDATA_MIXED
        {
            return Err(FileSystemError::Corrupted(
                "inode counts do not match its block map".to_string(),
            ));
        }
        Ok(inode)
    }

    fn encode(&self, buf: &mut Block) -> Result<()> {
        codec::encode_record(RecordKind::Inode, self, buf)
    }
}

/// jnode：第二层块，内嵌接下来的 `NDATA_MIXED` 字节，并指向至多 `NMAP_J` 个 knode
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Jnode {
    pub kmap: Vec<BlockId>,
    pub data: Vec<u8>,
}

impl Record for Jnode {
    fn decode(buf: &Block) -> Result<Self> {
        let jnode: Jnode = codec::decode_record(RecordKind::Jnode, buf)?;
        if jnode.kmap.len() > NMAP_J || jnode.data.len() > NDATA_MIXED {
            return Err(FileSystemError::Corrupted(
                "jnode holds more than a block".to_string(),
            ));
        }
        Ok(jnode)
    }

    fn encode(&self, buf: &mut Block) -> Result<()> {
        codec::encode_record(RecordKind::Jnode, self, buf)
    }
}

/// knode：第三层块，整块都是数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Knode {
    pub data: [u8; NDATA_FULL],
}

impl Default for Knode {
    fn default() -> Self {
        Self {
            data: [0; NDATA_FULL],
        }
    }
}

impl Record for Knode {
    fn decode(buf: &Block) -> Result<Self> {
        Ok(Self { data: *buf })
    }

    fn encode(&self, buf: &mut Block) -> Result<()> {
        buf.copy_from_slice(&self.data);
        Ok(())
    }
}

const MIX_A: u32 = 0x9E37_79B1;
const MIX_B: u32 = 0x85EB_CA77;

/// 由 inode 序号和代号算出两个独立的校验值。
///
/// 第一个校验值最低位恒为 1，全零的块永远校验不过。
pub fn checksums(index: u32, generation: u32) -> [u32; 2] {
    let a = (index ^ generation).wrapping_mul(MIX_A) ^ !generation;
    let b = (!index).wrapping_mul(MIX_B) ^ generation.rotate_left(16) ^ index.wrapping_mul(MIX_A);
    [a | 1, b]
}

/// inum = 代号 << 32 | 序号
#[inline]
pub fn compose_inum(index: u32, generation: u32) -> Inum {
    (generation as u64) << 32 | index as u64
}

#[inline]
pub fn split_inum(inum: Inum) -> (u32, u32) {
    (inum as u32, (inum >> 32) as u32)
}
