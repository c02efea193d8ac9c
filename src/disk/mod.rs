pub mod block_device;
pub mod mem_disk;
pub mod types;
pub mod view;

pub use block_device::BlockDevice;
pub use mem_disk::MemDisk;
pub use types::{Block, BlockId, BLOCK_NUM, BLOCK_SIZE, DISK_SIZE};
pub use view::{Access, BlockView, Record};
