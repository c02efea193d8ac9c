/// 每个逻辑块（Block）的大小：512B
/// 文件系统以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 512;

/// 虚拟磁盘总大小（单位：字节）：16MB
pub const DISK_SIZE: u64 = 16 * 1024 * 1024;

/// 磁盘默认包含的块总数：16MB / 512B = 32768 块
pub const BLOCK_NUM: u32 = (DISK_SIZE / BLOCK_SIZE as u64) as u32;

/// 定义一个逻辑块类型（每块 512B 的字节数组）
/// 所有磁盘读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];

/// 块号，从 0 开始连续编号
pub type BlockId = u32;
