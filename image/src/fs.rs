//! The metadata engine: inode allocation, data-block allocation,
//! directory-entry scan/insert/remove, empty-directory detection, and the
//! six file-system operations.
//!
//! Every operation pre-validates its arguments before mutating anything,
//! so a returning error leaves the image byte-identical to its pre-call
//! state (spec.md §7).

use std::mem::size_of;

use log::{debug, warn};
use proto::{MfsError, Result};

use crate::disk::Image;
use crate::layout::{
	DirEntry, FileType, Inode, ALL_ONES, BSIZE, DATA_OFFSET, DIRENTS_PER_BLOCK, NAME_MAX, NBLOCKS,
	NDIRECT, NINODES,
};

/// Information returned by `stat`.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
	pub ftype: FileType,
	pub size: u32,
}

/// The metadata engine, generalized over an owned [`Image`] value rather
/// than process-wide static state, so it can be constructed against an
/// in-memory image for testing.
pub struct FsEngine {
	image: Image,
}

fn validate_inum(inum: i32) -> Result<usize> {
	if inum < 0 || inum as usize >= NINODES {
		return Err(MfsError::InvalidInode(inum));
	}
	Ok(inum as usize)
}

fn block_index_of(addr: u32) -> usize {
	((addr as u64 - DATA_OFFSET) / BSIZE as u64) as usize
}

impl FsEngine {
	pub fn new(image: Image) -> Self {
		Self {
			image,
		}
	}

	pub fn flush(&mut self) -> Result<()> {
		self.image.flush()
	}

	pub fn into_image(self) -> Image {
		self.image
	}

	/// Reads a directory block into `buf`, splitting it into
	/// [`DirEntry`] records.
	fn read_dir_block(&mut self, offset: u64, buf: &mut [DirEntry; DIRENTS_PER_BLOCK]) -> Result<()> {
		let mut raw = [0u8; BSIZE];
		self.image.read_block(offset, &mut raw)?;
		for (i, entry) in buf.iter_mut().enumerate() {
			let start = i * size_of::<DirEntry>();
			let bytes = &raw[start..start + size_of::<DirEntry>()];
			*entry = unsafe { std::ptr::read(bytes.as_ptr() as *const DirEntry) };
		}
		Ok(())
	}

	/// Writes `buf` back to a directory block.
	fn write_dir_block(&mut self, offset: u64, buf: &[DirEntry; DIRENTS_PER_BLOCK]) -> Result<()> {
		let mut raw = [0u8; BSIZE];
		for (i, entry) in buf.iter().enumerate() {
			let start = i * size_of::<DirEntry>();
			raw[start..start + size_of::<DirEntry>()].copy_from_slice(crate::layout::as_bytes(entry));
		}
		self.image.write_block(offset, &raw)
	}

	/// Initializes a freshly-allocated data block as an empty directory
	/// block (all entries free).
	fn init_dir_block(&mut self, offset: u64) -> Result<()> {
		let entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
		self.write_dir_block(offset, &entries)
	}

	// ---- allocation helpers (spec.md §4.2.7) ----

	/// Linear scan of the inode table for the lowest-indexed `UNUSED`
	/// inode.
	fn allocate_inode(&self) -> Option<usize> {
		(0..NINODES).find(|&i| self.image.inode(i).file_type() == FileType::Unused)
	}

	/// Linear scan of the bitmap for the lowest free bit; marks it used
	/// and returns the block's absolute byte offset.
	fn allocate_data_block(&mut self) -> Result<u32> {
		for i in 0..NBLOCKS {
			if !self.image.read_bit(i) {
				self.image.set_bit(i)?;
				return Ok(Image::block_offset(i) as u32);
			}
		}
		Err(MfsError::NoFreeBlock)
	}

	/// Number of bitmap bits still clear. Read-only: used to pre-validate
	/// that a multi-block operation can complete before any of it runs.
	fn free_block_count(&self) -> usize {
		(0..NBLOCKS).filter(|&i| !self.image.read_bit(i)).count()
	}

	// ---- 4.2.1 lookup ----

	/// Returns the inode number of `name` within directory `pinum`, or
	/// `-1` if it isn't found or `pinum` isn't a valid directory.
	pub fn lookup(&mut self, pinum: i32, name: &str) -> i32 {
		match self.lookup_inner(pinum, name) {
			Ok(inum) => inum,
			Err(e) => {
				debug!("lookup({pinum}, {name:?}) failed: {e}");
				-1
			}
		}
	}

	fn lookup_inner(&mut self, pinum: i32, name: &str) -> Result<i32> {
		let pinum = validate_inum(pinum)?;
		let parent = *self.image.inode(pinum);
		if parent.file_type() != FileType::Directory {
			return Err(MfsError::WrongType);
		}

		for i in 0..NDIRECT {
			let addr = parent.addrs[i];
			if addr == ALL_ONES {
				continue;
			}
			let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
			self.read_dir_block(addr as u64, &mut entries)?;
			for entry in entries.iter() {
				if !entry.is_free() && entry.name_str() == name {
					return Ok(entry.inum);
				}
			}
		}
		Err(MfsError::NotFound)
	}

	// ---- 4.2.2 stat ----

	/// Populates type and size for `inum`. Returns `None` if `inum` is
	/// out of range or `UNUSED`.
	pub fn stat(&mut self, inum: i32) -> Option<Stat> {
		let inum = validate_inum(inum).ok()?;
		let inode = self.image.inode(inum);
		if inode.file_type() == FileType::Unused {
			return None;
		}
		Some(Stat {
			ftype: inode.file_type(),
			size: inode.size,
		})
	}

	// ---- 4.2.3 read ----

	/// Reads data block `block` of `inum` into `out`. Works for both
	/// regular files and directories; the caller is responsible for
	/// interpreting the bytes.
	pub fn read(&mut self, inum: i32, block: i32, out: &mut [u8; BSIZE]) -> i32 {
		match self.read_inner(inum, block, out) {
			Ok(()) => 0,
			Err(e) => {
				debug!("read({inum}, {block}) failed: {e}");
				-1
			}
		}
	}

	fn read_inner(&mut self, inum: i32, block: i32, out: &mut [u8; BSIZE]) -> Result<()> {
		let inum = validate_inum(inum)?;
		if block < 0 || block as usize >= NDIRECT {
			return Err(MfsError::InvalidBlock(block));
		}
		let inode = *self.image.inode(inum);
		if inode.file_type() == FileType::Unused {
			return Err(MfsError::WrongType);
		}
		let addr = inode.addrs[block as usize];
		if addr == ALL_ONES {
			return Err(MfsError::InvalidBlock(block));
		}
		self.image.read_block(addr as u64, out)
	}

	// ---- 4.2.4 write ----

	/// Writes `BSIZE` bytes from `data` to data block `block` of regular
	/// file `inum`, allocating the block on first write.
	pub fn write(&mut self, inum: i32, block: i32, data: &[u8; BSIZE]) -> i32 {
		match self.write_inner(inum, block, data) {
			Ok(()) => 0,
			Err(e) => {
				warn!("write({inum}, {block}) failed: {e}");
				-1
			}
		}
	}

	fn write_inner(&mut self, inum: i32, block: i32, data: &[u8; BSIZE]) -> Result<()> {
		let inum = validate_inum(inum)?;
		// spec.md validates `block` against NBLOCKS, but `addrs[]` only
		// has NDIRECT slots: any block beyond that can never have a slot
		// to allocate, so it is rejected here too rather than indexing
		// out of bounds.
		if block < 0 || block as usize >= NBLOCKS || block as usize >= NDIRECT {
			return Err(MfsError::InvalidBlock(block));
		}
		if self.image.inode(inum).file_type() != FileType::RegularFile {
			return Err(MfsError::WrongType);
		}

		let block = block as usize;
		let mut inode = *self.image.inode(inum);
		if inode.addrs[block] == ALL_ONES {
			let addr = self.allocate_data_block()?;
			inode.addrs[block] = addr;
			inode.size += BSIZE as u32;
			*self.image.inode_mut(inum) = inode;
			self.image.write_inode(inum)?;
		}

		let addr = self.image.inode(inum).addrs[block];
		self.image.write_block(addr as u64, data)?;
		self.image.flush()
	}

	// ---- 4.2.5 create ----

	/// Creates a file or directory named `name` in directory `pinum`.
	/// Returns the new inode number, `0` if `name` already exists
	/// (idempotent success), or `-1` on failure.
	pub fn create(&mut self, pinum: i32, ftype: FileType, name: &str) -> i32 {
		match self.create_inner(pinum, ftype, name) {
			Ok(inum) => inum,
			Err(e) => {
				warn!("create({pinum}, {name:?}) failed: {e}");
				-1
			}
		}
	}

	fn create_inner(&mut self, pinum: i32, ftype: FileType, name: &str) -> Result<i32> {
		let pinum = validate_inum(pinum)?;
		if name.len() > NAME_MAX {
			return Err(MfsError::NameTooLong(name.len()));
		}
		let parent = *self.image.inode(pinum);
		if parent.file_type() != FileType::Directory {
			return Err(MfsError::WrongType);
		}

		// Step 1: name scan.
		let mut slot_in_existing_block: Option<(usize, u64, usize)> = None; // (addrs idx, block addr, entry idx)
		let mut first_unused_addrs_slot: Option<usize> = None;

		for i in 0..NDIRECT {
			let addr = parent.addrs[i];
			if addr == ALL_ONES {
				if first_unused_addrs_slot.is_none() {
					first_unused_addrs_slot = Some(i);
				}
				continue;
			}
			let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
			self.read_dir_block(addr as u64, &mut entries)?;
			for (j, entry) in entries.iter().enumerate() {
				if !entry.is_free() && entry.name_str() == name {
					return Ok(0); // already exists: idempotent success
				}
				if entry.is_free() && slot_in_existing_block.is_none() {
					slot_in_existing_block = Some((i, addr as u64, j));
				}
			}
		}

		// Step 2: choose placement, without allocating anything yet. Only
		// decide *whether* a new parent block is needed.
		let needs_new_parent_block = slot_in_existing_block.is_none();
		if needs_new_parent_block && first_unused_addrs_slot.is_none() {
			return Err(MfsError::DirectoryFull);
		}

		// Step 3: pre-validate that every block and the one inode this
		// call could need are actually available, before mutating
		// anything. A later allocation cannot then fail, so a call that
		// returns `-1` never leaves a block allocated-but-unreferenced or
		// an inode consumed-but-unused: validate first, mutate after,
		// exactly as every other operation here does.
		let blocks_needed =
			usize::from(needs_new_parent_block) + usize::from(ftype == FileType::Directory);
		if self.free_block_count() < blocks_needed {
			return Err(MfsError::NoFreeBlock);
		}
		if self.allocate_inode().is_none() {
			return Err(MfsError::NoFreeInode);
		}

		// Now perform the placement allocation decided in step 2; the
		// pre-validation above guarantees it succeeds.
		let (dirent_addr, dirent_index, parent_addrs_change): (u64, usize, Option<(usize, u32, u32)>) =
			if let Some((_, addr, j)) = slot_in_existing_block {
				(addr, j, None)
			} else {
				let i = first_unused_addrs_slot.expect("checked above");
				let addr = self.allocate_data_block()?;
				self.init_dir_block(addr as u64)?;
				(addr as u64, 0, Some((i, addr, parent.size + BSIZE as u32)))
			};

		// Step 4: allocate the inode decided available above, then
		// materialise the child.
		let new_inum = self.allocate_inode().ok_or(MfsError::NoFreeInode)?;
		let mut child = Inode::EMPTY;
		match ftype {
			FileType::Directory => {
				let addr = self.allocate_data_block()?;
				self.init_dir_block(addr as u64)?;
				let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
				self.read_dir_block(addr as u64, &mut entries)?;
				entries[0] = DirEntry::new(".", new_inum as i32);
				entries[1] = DirEntry::new("..", pinum as i32);
				self.write_dir_block(addr as u64, &entries)?;

				child.ftype = FileType::Directory as u8;
				child.size = BSIZE as u32;
				child.addrs[0] = addr;
			}
			FileType::RegularFile => {
				child.ftype = FileType::RegularFile as u8;
				child.size = 0;
				// No data block is pre-allocated; `write` allocates the
				// first one lazily.
			}
			FileType::Unused => return Err(MfsError::WrongType),
		}

		// Step 5: persist. Write the new directory entry, the child
		// inode, and the (possibly modified) parent inode, then flush.
		let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
		self.read_dir_block(dirent_addr, &mut entries)?;
		entries[dirent_index] = DirEntry::new(name, new_inum as i32);
		self.write_dir_block(dirent_addr, &entries)?;

		*self.image.inode_mut(new_inum) = child;
		self.image.write_inode(new_inum)?;

		if let Some((i, addr, new_size)) = parent_addrs_change {
			let parent_mut = self.image.inode_mut(pinum);
			parent_mut.addrs[i] = addr;
			parent_mut.size = new_size;
			self.image.write_inode(pinum)?;
		}

		self.image.flush()?;
		Ok(new_inum as i32)
	}

	// ---- 4.2.6 unlink ----

	/// Removes `name` from directory `pinum`. Returns `0` on success or
	/// if `name` doesn't exist (absence is not a failure), `-1` if the
	/// target is a non-empty directory.
	pub fn unlink(&mut self, pinum: i32, name: &str) -> i32 {
		match self.unlink_inner(pinum, name) {
			Ok(()) => 0,
			Err(e) => {
				warn!("unlink({pinum}, {name:?}) failed: {e}");
				-1
			}
		}
	}

	fn unlink_inner(&mut self, pinum: i32, name: &str) -> Result<()> {
		let pinum = validate_inum(pinum)?;
		let parent = *self.image.inode(pinum);
		if parent.file_type() != FileType::Directory {
			return Err(MfsError::WrongType);
		}

		let mut found: Option<(u64, usize, usize)> = None; // (block addr, entry idx, target inum)
		let mut target_inum = 0usize;

		'outer: for i in 0..NDIRECT {
			let addr = parent.addrs[i];
			if addr == ALL_ONES {
				continue;
			}
			let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
			self.read_dir_block(addr as u64, &mut entries)?;
			for (j, entry) in entries.iter().enumerate() {
				if !entry.is_free() && entry.name_str() == name {
					target_inum = entry.inum as usize;
					found = Some((addr as u64, j, target_inum));
					break 'outer;
				}
			}
		}

		let (block_addr, entry_idx, target_inum) = match found {
			Some(v) => v,
			None => return Ok(()), // absence is not a failure
		};

		let target = *self.image.inode(target_inum);
		if target.file_type() == FileType::Directory {
			for i in 0..NDIRECT {
				let addr = target.addrs[i];
				if addr == ALL_ONES {
					continue;
				}
				let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
				self.read_dir_block(addr as u64, &mut entries)?;
				for (j, entry) in entries.iter().enumerate() {
					let is_dot_or_dotdot = i == 0 && (j == 0 || j == 1);
					if !is_dot_or_dotdot && !entry.is_free() {
						return Err(MfsError::DirectoryNotEmpty);
					}
				}
			}
		}

		// Remove the directory entry.
		let mut entries = [DirEntry::FREE; DIRENTS_PER_BLOCK];
		self.read_dir_block(block_addr, &mut entries)?;
		entries[entry_idx].inum = -1;
		self.write_dir_block(block_addr, &entries)?;

		// Free the child inode and its data blocks (corrected bitmap
		// bookkeeping, see spec.md §9).
		for addr in target.addrs.iter() {
			if *addr != ALL_ONES {
				self.image.clear_bit(block_index_of(*addr))?;
			}
		}
		*self.image.inode_mut(target_inum) = Inode::EMPTY;
		self.image.write_inode(target_inum)?;

		self.image.flush()
	}
}
