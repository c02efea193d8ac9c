//! 记录的显式序列化：固定宽度、小端整数，长度上限为一个块，
//! 写入时剩余部分补零，读取时忽略尾部填充。
//!
//! 带类型的记录以 `(kind, version)` 两个字节开头，解码时先校验这两个字节。

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    disk::{Block, BLOCK_SIZE},
    fs::error::{FileSystemError, Result},
};

pub const FORMAT_VERSION: u8 = 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    SuperBlock = 1,
    Inode = 2,
    Jnode = 3,
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(BLOCK_SIZE as u64)
        .allow_trailing_bytes()
}

/// 不带头部，直接编码（位图块正好占满一整块）
pub fn encode_raw<T: Serialize>(value: &T, buf: &mut Block) -> Result<()> {
    let bytes = options().serialize(value)?;
    buf.fill(0);
    buf[..bytes.len()].copy_from_slice(&bytes);
    Ok(())
}

pub fn decode_raw<T: DeserializeOwned>(buf: &Block) -> Result<T> {
    Ok(options().deserialize(buf)?)
}

pub fn encode_record<T: Serialize>(kind: RecordKind, value: &T, buf: &mut Block) -> Result<()> {
    encode_raw(&(kind as u8, FORMAT_VERSION, value), buf)
}

pub fn decode_record<T: DeserializeOwned>(kind: RecordKind, buf: &Block) -> Result<T> {
    let (found, version): (u8, u8) = decode_raw(buf)?;
    if found != kind as u8 {
        return Err(FileSystemError::Corrupted(format!(
            "expected {:?} record, found kind {}",
            kind, found
        )));
    }
    if version != FORMAT_VERSION {
        return Err(FileSystemError::Corrupted(format!(
            "unsupported {:?} record version {}",
            kind, version
        )));
    }

    let (_, _, value): (u8, u8, T) = decode_raw(buf)?;
    Ok(value)
}
