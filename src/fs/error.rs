use std::fmt;

use crate::fs::config::Inum;

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    DiskFull,                                   // 磁盘已满
    StaleHandle(Inum),                          // inum 已失效（已释放、被复用或从未分配）
    FileTooLarge { size: usize, max: usize },   // 超出单个文件的最大长度
    OutOfRange(u64),                            // 块号或 inum 越界
    NotFound(String),                           // 文件或目录不存在，带路径
    AlreadyExists(String),                      // 文件或目录已存在，带路径
    NotADirectory(String),                      // 期望目录，实际不是
    DirectoryNotEmpty(String),                  // 目录非空
    InvalidPath(String),                        // 路径非法
    Codec(bincode::Error),                      // 记录编解码失败
    Corrupted(String),                          // 文件系统损坏
}

impl From<bincode::Error> for FileSystemError {
    fn from(e: bincode::Error) -> Self {
        FileSystemError::Codec(e)
    }
}

// 实现 Display trait，用于打印错误信息
impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiskFull => write!(f, "Disk space is full"),
            Self::StaleHandle(inum) => write!(f, "Stale file handle: {:#x}", inum),
            Self::FileTooLarge { size, max } => {
                write!(f, "File too large: {} bytes (max {} bytes)", size, max)
            }
            Self::OutOfRange(id) => write!(f, "Id out of range: {}", id),
            Self::NotFound(path) => write!(f, "File or directory not found: {}", path),
            Self::AlreadyExists(path) => write!(f, "File or directory already exists: {}", path),
            Self::NotADirectory(path) => write!(f, "Expected a directory, found a file: {}", path),
            Self::DirectoryNotEmpty(path) => write!(f, "Directory is not empty: {}", path),
            Self::InvalidPath(path) => write!(f, "Invalid path: {}", path),
            Self::Codec(e) => write!(f, "Record encoding error: {}", e),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
