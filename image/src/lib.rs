//! On-disk image manager and metadata engine: the heart of MFS.
//!
//! `disk::Image` owns the backing file and the cached header region;
//! `fs::FsEngine` implements the six file-system operations against an
//! owned `Image` value rather than process-wide static state, so it can
//! be exercised directly in tests without a server or a socket.

pub mod disk;
pub mod fs;
pub mod layout;

pub use disk::Image;
pub use fs::{FsEngine, Stat};
pub use layout::{FileType, BSIZE, DIRENTS_PER_BLOCK, NAME_MAX, NBLOCKS, NDIRECT, NINODES};
