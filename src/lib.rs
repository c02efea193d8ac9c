pub mod disk;
pub mod extent;
pub mod fs;
pub mod lock;
pub mod utils;
pub mod yfs;
