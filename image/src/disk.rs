//! The on-disk image manager: owns the backing file, keeps the header
//! region (superblock, inode table, bitmap) cached in memory, and exposes
//! positioned block I/O plus bitmap bit accessors.
//!
//! Grounded on the teacher's `mkfs::ext2` module: a `File` handle, seek
//! then `read_exact`/`write_all`, and small accessor methods rather than
//! a generic block-device trait (the teacher does not introduce one
//! either — it works directly against `std::fs::File`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use proto::MfsError;

use crate::layout::{
	as_bytes, as_bytes_mut, DirEntry, FileType, Inode, Superblock, BITMAP_OFFSET, BSIZE,
	DATA_OFFSET, DIRENTS_PER_BLOCK, INODES_OFFSET, NBLOCKS, NINODES,
};

/// Owns the image file and the authoritative in-memory copy of its
/// header region.
pub struct Image {
	file: File,
	superblock: Superblock,
	inodes: Vec<Inode>,
	/// One bit per data block, MSB-first within each byte. Sized to the
	/// full `BSIZE`-byte bitmap region even though only `NBLOCKS` bits
	/// are meaningful.
	bitmap: [u8; BSIZE],
}

impl Image {
	/// Opens an existing image, or creates and formats a new one.
	pub fn open_or_create(path: &Path) -> Result<Self, MfsError> {
		if path.exists() {
			Self::open(path)
		} else {
			Self::create(path)
		}
	}

	fn open(path: &Path) -> Result<Self, MfsError> {
		let mut file = OpenOptions::new().read(true).write(true).open(path)?;

		let mut superblock = Superblock::default();
		file.seek(SeekFrom::Start(crate::layout::SUPERBLOCK_OFFSET))?;
		file.read_exact(as_bytes_mut(&mut superblock))?;

		let mut inodes = vec![Inode::EMPTY; NINODES];
		file.seek(SeekFrom::Start(INODES_OFFSET))?;
		for inode in inodes.iter_mut() {
			file.read_exact(as_bytes_mut(inode))?;
		}

		let mut bitmap = [0u8; BSIZE];
		file.seek(SeekFrom::Start(BITMAP_OFFSET))?;
		file.read_exact(&mut bitmap)?;

		Ok(Self {
			file,
			superblock,
			inodes,
			bitmap,
		})
	}

	fn create(path: &Path) -> Result<Self, MfsError> {
		let mut file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;

		let superblock = Superblock::default();
		let mut inodes = vec![Inode::EMPTY; NINODES];
		let mut bitmap = [0u8; BSIZE];

		// Bit 0 is reserved for the root directory's first data block.
		bitmap[0] |= 1 << 7;

		// Inode 0 is the root directory, with its first block already
		// allocated.
		inodes[0] = Inode {
			ftype: FileType::Directory as u8,
			size: BSIZE as u32,
			addrs: {
				let mut a = [crate::layout::ALL_ONES; crate::layout::NDIRECT];
				a[0] = DATA_OFFSET as u32;
				a
			},
		};

		let mut image = Self {
			file,
			superblock,
			inodes,
			bitmap,
		};

		// First directory block: "." and ".." both pointing at the root,
		// the rest free.
		let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
		entries[0] = DirEntry::new(".", 0);
		entries[1] = DirEntry::new("..", 0);
		let mut block = [0u8; BSIZE];
		for (i, e) in entries.iter().enumerate() {
			block[i * std::mem::size_of::<DirEntry>()..(i + 1) * std::mem::size_of::<DirEntry>()]
				.copy_from_slice(as_bytes(e));
		}

		image.write_block(DATA_OFFSET, &block)?;
		image.write_header()?;
		image.flush()?;

		Ok(image)
	}

	/// Persists the superblock, the full inode table, and the bitmap.
	fn write_header(&mut self) -> Result<(), MfsError> {
		self.file
			.seek(SeekFrom::Start(crate::layout::SUPERBLOCK_OFFSET))?;
		self.file.write_all(as_bytes(&self.superblock))?;

		self.file.seek(SeekFrom::Start(INODES_OFFSET))?;
		for inode in &self.inodes {
			self.file.write_all(as_bytes(inode))?;
		}

		self.file.seek(SeekFrom::Start(BITMAP_OFFSET))?;
		self.file.write_all(&self.bitmap)?;

		Ok(())
	}

	pub fn superblock(&self) -> &Superblock {
		&self.superblock
	}

	pub fn inode(&self, i: usize) -> &Inode {
		&self.inodes[i]
	}

	pub fn inode_mut(&mut self, i: usize) -> &mut Inode {
		&mut self.inodes[i]
	}

	/// Persists inode `i` to disk at `inodes_offset + i * sizeof(inode)`.
	pub fn write_inode(&mut self, i: usize) -> Result<(), MfsError> {
		let offset = Inode::disk_offset(i);
		self.file.seek(SeekFrom::Start(offset))?;
		self.file.write_all(as_bytes(&self.inodes[i]))?;
		Ok(())
	}

	/// Reads bit `i` of the in-memory bitmap, MSB-first within its byte.
	pub fn read_bit(&self, i: usize) -> bool {
		let byte = self.bitmap[i / 8];
		(byte & (1 << (7 - (i % 8)))) != 0
	}

	/// Sets bit `i` of the in-memory bitmap and persists the containing
	/// byte before returning.
	pub fn set_bit(&mut self, i: usize) -> Result<(), MfsError> {
		self.bitmap[i / 8] |= 1 << (7 - (i % 8));
		self.persist_bitmap_byte(i / 8)
	}

	/// Clears bit `i` of the in-memory bitmap and persists the
	/// containing byte before returning.
	pub fn clear_bit(&mut self, i: usize) -> Result<(), MfsError> {
		self.bitmap[i / 8] &= !(1 << (7 - (i % 8)));
		self.persist_bitmap_byte(i / 8)
	}

	fn persist_bitmap_byte(&mut self, byte_index: usize) -> Result<(), MfsError> {
		self.file
			.seek(SeekFrom::Start(BITMAP_OFFSET + byte_index as u64))?;
		self.file.write_all(&self.bitmap[byte_index..byte_index + 1])?;
		Ok(())
	}

	/// Positioned full-block read.
	pub fn read_block(&mut self, offset: u64, buf: &mut [u8; BSIZE]) -> Result<(), MfsError> {
		self.file.seek(SeekFrom::Start(offset))?;
		self.file.read_exact(buf)?;
		Ok(())
	}

	/// Positioned full-block write.
	pub fn write_block(&mut self, offset: u64, buf: &[u8; BSIZE]) -> Result<(), MfsError> {
		self.file.seek(SeekFrom::Start(offset))?;
		self.file.write_all(buf)?;
		Ok(())
	}

	/// Forces buffered file data to durable storage.
	pub fn flush(&mut self) -> Result<(), MfsError> {
		self.file.flush()?;
		self.file.sync_all()?;
		Ok(())
	}

	/// The absolute byte offset of data block `k` (`0 <= k < NBLOCKS`).
	pub fn block_offset(k: usize) -> u64 {
		DATA_OFFSET + (k * BSIZE) as u64
	}

	pub fn nblocks() -> usize {
		NBLOCKS
	}
}
