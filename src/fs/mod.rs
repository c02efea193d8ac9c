pub mod block_bitmap;
pub mod block_manager;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod inode;
pub mod inode_manager;
pub mod layout;
pub mod super_block;

pub use block_manager::BlockManager;
pub use config::{FsOptions, Inum, StalePolicy, ROOT_INUM};
pub use directory::{DirEntry, Directory};
pub use error::{FileSystemError, Result};
pub use inode::{Attr, InodeType};
pub use inode_manager::InodeManager;
