use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 当前时间（秒）
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// 把秒级时间戳格式化成可读的字符串
pub fn format_timestamp(secs: u64) -> String {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// 生成一个随机的 inode 代号（取 UUID v4 的低 32 位，全部是随机位）
pub fn generation_tag() -> u32 {
    Uuid::new_v4().as_u128() as u32
}
