//! On-disk constants and fixed-size record types.
//!
//! All records here are read and written by transmuting their raw bytes,
//! the same way the teacher's `ext2::Superblock`/`BlockGroupDescriptor`/
//! `INode` are: `#[repr(C, packed)]` plus a small `as_bytes`/`as_bytes_mut`
//! pair standing in for the teacher's `reinterpret` helper. This is safe
//! within a single process reading back its own image file; it is
//! deliberately *not* how the network wire format works (see
//! `proto::wire`), which defines its encoding explicitly instead.

use std::mem::size_of;
use std::slice;

/// Size in bytes of one data block.
pub const BSIZE: usize = 4096;
/// Number of inodes in the inode table.
pub const NINODES: usize = 64;
/// Number of data blocks in the data region.
pub const NBLOCKS: usize = 1024;
/// Number of direct block addresses per inode.
pub const NDIRECT: usize = 14;
/// Number of directory entries that fit in one data block.
pub const DIRENTS_PER_BLOCK: usize = BSIZE / size_of::<DirEntry>();
/// Maximum length of a name, excluding the NUL terminator.
pub const NAME_MAX: usize = 60;

/// Sentinel marking an unused `addrs[]` slot: the all-ones value of a
/// 32-bit address.
pub const ALL_ONES: u32 = u32::MAX;

/// Byte offset of the combined superblock + inode table region.
pub const SUPERBLOCK_OFFSET: u64 = BSIZE as u64;
/// Byte offset of the data bitmap region.
pub const BITMAP_OFFSET: u64 = 2 * BSIZE as u64;
/// Byte offset of the start of the data region.
pub const DATA_OFFSET: u64 = 3 * BSIZE as u64;
/// Byte offset of the first inode, right after the superblock header.
pub const INODES_OFFSET: u64 = SUPERBLOCK_OFFSET + size_of::<Superblock>() as u64;

/// An inode's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
	Unused = 0,
	RegularFile = 1,
	Directory = 2,
}

impl FileType {
	pub fn from_u8(v: u8) -> Self {
		match v {
			1 => FileType::RegularFile,
			2 => FileType::Directory,
			_ => FileType::Unused,
		}
	}
}

/// The superblock: total image size, number of data blocks, number of
/// inodes. Written once at image creation and never mutated afterward.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct Superblock {
	/// Total size of the image, in blocks (3 header blocks + `nblocks`).
	pub size: u32,
	/// Number of data blocks in the data region.
	pub nblocks: u32,
	/// Number of inodes in the inode table.
	pub ninodes: u32,
}

impl Default for Superblock {
	fn default() -> Self {
		Self {
			size: 3 + NBLOCKS as u32,
			nblocks: NBLOCKS as u32,
			ninodes: NINODES as u32,
		}
	}
}

/// A fixed-size inode record.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct Inode {
	/// The inode's type, stored as a raw byte (see [`FileType`]).
	pub ftype: u8,
	/// Size in bytes: `BSIZE` times the number of occupied `addrs[]`
	/// slots, for both regular files and directories.
	pub size: u32,
	/// Absolute byte offsets of this inode's data blocks, or
	/// [`ALL_ONES`] for an unused slot.
	pub addrs: [u32; NDIRECT],
}

impl Inode {
	/// An all-`UNUSED` inode with every address slot free.
	pub const EMPTY: Inode = Inode {
		ftype: FileType::Unused as u8,
		size: 0,
		addrs: [ALL_ONES; NDIRECT],
	};

	pub fn file_type(&self) -> FileType {
		FileType::from_u8(self.ftype)
	}

	/// Byte offset on disk of the `i`th inode.
	pub fn disk_offset(i: usize) -> u64 {
		INODES_OFFSET + (i * size_of::<Inode>()) as u64
	}
}

/// A directory entry: a fixed-width name plus an inode number. `inum ==
/// -1` marks a free slot.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
	/// The entry's name, NUL-padded. Not necessarily NUL-terminated if
	/// the name is exactly `NAME_MAX` bytes long.
	pub name: [u8; NAME_MAX],
	/// The entry's inode number, or `-1` if the slot is free.
	pub inum: i32,
}

impl DirEntry {
	/// A free directory-entry slot.
	pub const FREE: DirEntry = DirEntry {
		name: [0; NAME_MAX],
		inum: -1,
	};

	pub fn new(name: &str, inum: i32) -> Self {
		let mut buf = [0u8; NAME_MAX];
		let bytes = name.as_bytes();
		let n = bytes.len().min(NAME_MAX);
		buf[..n].copy_from_slice(&bytes[..n]);
		Self {
			name: buf,
			inum,
		}
	}

	pub fn name_str(&self) -> String {
		let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_MAX);
		String::from_utf8_lossy(&self.name[..end]).into_owned()
	}

	pub fn is_free(&self) -> bool {
		self.inum == -1
	}
}

/// Reinterprets `t` as its raw byte representation.
///
/// Safe for the `#[repr(C, packed)]` plain-old-data records in this
/// module: they hold no padding, pointers, or invalid bit patterns.
pub fn as_bytes<T: Copy>(t: &T) -> &[u8] {
	unsafe { slice::from_raw_parts(t as *const T as *const u8, size_of::<T>()) }
}

/// Reinterprets `t` as a mutable raw byte buffer, for reading a record in
/// place.
pub fn as_bytes_mut<T: Copy>(t: &mut T) -> &mut [u8] {
	unsafe { slice::from_raw_parts_mut(t as *mut T as *mut u8, size_of::<T>()) }
}
