//! End-to-end scenarios against a real temporary image file, exercising
//! `FsEngine` directly without a server or a socket (the reason it is
//! generalized over an owned `Image` value rather than static state).

use image::{FileType, FsEngine, Image, BSIZE, NBLOCKS, NINODES};
use std::collections::HashSet;
use tempfile::tempdir;

const ROOT: i32 = 0;

fn new_engine() -> (tempfile::TempDir, FsEngine) {
	let dir = tempdir().unwrap();
	let path = dir.path().join("mfs.img");
	let img = Image::open_or_create(&path).unwrap();
	(dir, FsEngine::new(img))
}

/// Every data block an inode references, by absolute byte offset, across
/// the whole inode table. Duplicates are preserved so callers can detect
/// a block referenced by more than one inode.
fn referenced_blocks(image: &Image) -> Vec<u32> {
	let mut addrs = Vec::new();
	for i in 0..NINODES {
		let inode = *image.inode(i);
		if inode.file_type() == FileType::Unused {
			continue;
		}
		for &addr in inode.addrs.iter() {
			if addr != image::layout::ALL_ONES {
				addrs.push(addr);
			}
		}
	}
	addrs
}

/// Bitmap bits set to `1`, by absolute byte offset of the block they
/// correspond to.
fn set_bits(image: &Image) -> HashSet<u32> {
	(0..NBLOCKS)
		.filter(|&i| image.read_bit(i))
		.map(|i| Image::block_offset(i) as u32)
		.collect()
}

/// The invariant behind spec.md §3: every bitmap bit set to `1`
/// corresponds to exactly one block referenced by exactly one inode, and
/// vice versa. No leaked blocks (a set bit nothing references), no
/// double-referenced block (two inodes pointing at the same address).
fn assert_bitmap_matches_references(image: &Image) {
	let referenced = referenced_blocks(image);
	let unique: HashSet<u32> = referenced.iter().copied().collect();
	assert_eq!(
		referenced.len(),
		unique.len(),
		"a data block is referenced by more than one inode"
	);
	assert_eq!(
		set_bits(image),
		unique,
		"bitmap and inode addrs[] disagree about which blocks are in use"
	);
}

/// S1: create then lookup then stat round-trip.
#[test]
fn create_lookup_stat_roundtrip() {
	let (_dir, mut fs) = new_engine();

	let inum = fs.create(ROOT, FileType::RegularFile, "appear");
	assert!(inum > 0);

	assert_eq!(fs.lookup(ROOT, "appear"), inum);

	let stat = fs.stat(inum).expect("stat of fresh file");
	assert_eq!(stat.ftype, FileType::RegularFile);
	assert_eq!(stat.size, 0);
}

/// Creating the same name twice is idempotent success, not a second
/// inode.
#[test]
fn create_is_idempotent_on_existing_name() {
	let (_dir, mut fs) = new_engine();

	let inum = fs.create(ROOT, FileType::RegularFile, "once");
	assert!(inum > 0);
	assert_eq!(fs.create(ROOT, FileType::RegularFile, "once"), 0);
	assert_eq!(fs.lookup(ROOT, "once"), inum);
}

/// S3: write, overwrite, and read back, observing size growth only on
/// the first write to a given block.
#[test]
fn write_overwrite_read_roundtrip() {
	let (_dir, mut fs) = new_engine();
	let inum = fs.create(ROOT, FileType::RegularFile, "data.txt");

	let mut first = [0u8; BSIZE];
	first[..5].copy_from_slice(b"hello");
	assert_eq!(fs.write(inum, 0, &first), 0);
	assert_eq!(fs.stat(inum).unwrap().size, BSIZE as u32);

	let mut out = [0u8; BSIZE];
	assert_eq!(fs.read(inum, 0, &mut out), 0);
	assert_eq!(&out[..5], b"hello");

	let mut second = [0u8; BSIZE];
	second[..5].copy_from_slice(b"world");
	assert_eq!(fs.write(inum, 0, &second), 0);
	// Overwriting an already-allocated block does not grow size again.
	assert_eq!(fs.stat(inum).unwrap().size, BSIZE as u32);

	fs.read(inum, 0, &mut out);
	assert_eq!(&out[..5], b"world");
}

/// Writing to a directory inode is rejected.
#[test]
fn write_to_directory_is_rejected() {
	let (_dir, mut fs) = new_engine();
	let data = [0u8; BSIZE];
	assert_eq!(fs.write(ROOT, 0, &data), -1);
}

/// A name longer than the on-disk field is rejected outright rather than
/// silently truncated.
#[test]
fn create_rejects_name_too_long() {
	let (_dir, mut fs) = new_engine();
	let long_name = "x".repeat(200);
	assert_eq!(fs.create(ROOT, FileType::RegularFile, &long_name), -1);
}

/// unlink refuses to remove a non-empty directory, but succeeds once it
/// is empty, and absence of the name is success rather than failure.
#[test]
fn unlink_non_empty_directory_rejected_then_succeeds_when_empty() {
	let (_dir, mut fs) = new_engine();

	let dir_inum = fs.create(ROOT, FileType::Directory, "subdir");
	assert!(dir_inum > 0);
	let file_inum = fs.create(dir_inum, FileType::RegularFile, "child");
	assert!(file_inum > 0);

	assert_eq!(fs.unlink(ROOT, "subdir"), -1);

	assert_eq!(fs.unlink(dir_inum, "child"), 0);
	assert_eq!(fs.unlink(ROOT, "subdir"), 0);
	assert_eq!(fs.lookup(ROOT, "subdir"), -1);

	// Unlinking an already-absent name is still success.
	assert_eq!(fs.unlink(ROOT, "subdir"), 0);
}

/// S6: state persists across a close-and-reopen of the same image file.
#[test]
fn state_survives_reopen() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("mfs.img");

	let inum = {
		let img = Image::open_or_create(&path).unwrap();
		let mut fs = FsEngine::new(img);
		let inum = fs.create(ROOT, FileType::RegularFile, "persisted");
		let mut data = [0u8; BSIZE];
		data[..4].copy_from_slice(b"abcd");
		fs.write(inum, 0, &data);
		fs.flush().unwrap();
		inum
	};

	let img = Image::open_or_create(&path).unwrap();
	let mut fs = FsEngine::new(img);
	assert_eq!(fs.lookup(ROOT, "persisted"), inum);
	let mut out = [0u8; BSIZE];
	assert_eq!(fs.read(inum, 0, &mut out), 0);
	assert_eq!(&out[..4], b"abcd");
}

/// Writing the same data to the same block a second time is a no-op as
/// far as allocation and size are concerned: it neither grows `size` nor
/// allocates a second block.
#[test]
fn write_is_idempotent_under_duplicate_requests() {
	let (_dir, mut fs) = new_engine();
	let inum = fs.create(ROOT, FileType::RegularFile, "data.txt");

	let mut data = [0u8; BSIZE];
	data[..3].copy_from_slice(b"abc");

	assert_eq!(fs.write(inum, 0, &data), 0);
	let size_after_first = fs.stat(inum).unwrap().size;

	// A retransmitted write carries the identical request again.
	assert_eq!(fs.write(inum, 0, &data), 0);
	let size_after_second = fs.stat(inum).unwrap().size;

	assert_eq!(size_after_first, size_after_second);
	assert_bitmap_matches_references(&fs.into_image());
}

/// A freshly created directory's first block starts with "." pointing
/// at itself and ".." pointing at its parent, nothing else.
#[test]
fn new_directory_has_correct_dot_and_dotdot_entries() {
	let (_dir, mut fs) = new_engine();
	let dir_inum = fs.create(ROOT, FileType::Directory, "subdir");
	assert!(dir_inum > 0);

	let mut block = [0u8; BSIZE];
	assert_eq!(fs.read(dir_inum, 0, &mut block), 0);

	const ENTRY_LEN: usize = 64; // NAME_MAX (60) + inum (4)

	let dot_name = &block[0..60];
	let dot_inum = i32::from_le_bytes(block[60..64].try_into().unwrap());
	assert_eq!(&dot_name[..1], b".");
	assert!(dot_name[1..].iter().all(|&b| b == 0));
	assert_eq!(dot_inum, dir_inum);

	let dotdot_name = &block[ENTRY_LEN..ENTRY_LEN + 60];
	let dotdot_inum = i32::from_le_bytes(block[ENTRY_LEN + 60..ENTRY_LEN + 64].try_into().unwrap());
	assert_eq!(&dotdot_name[..2], b"..");
	assert!(dotdot_name[2..].iter().all(|&b| b == 0));
	assert_eq!(dotdot_inum, ROOT);

	// Every remaining slot in the block is free (inum == -1).
	for slot in 2..(BSIZE / ENTRY_LEN) {
		let inum = i32::from_le_bytes(
			block[slot * ENTRY_LEN + 60..slot * ENTRY_LEN + 64]
				.try_into()
				.unwrap(),
		);
		assert_eq!(inum, -1, "slot {slot} should be free");
	}
}

/// After a mix of creates, writes, and unlinks, every block the bitmap
/// marks used is referenced by exactly one inode and vice versa.
#[test]
fn bitmap_matches_references_after_mixed_operations() {
	let (_dir, mut fs) = new_engine();

	let a = fs.create(ROOT, FileType::RegularFile, "a");
	let dir = fs.create(ROOT, FileType::Directory, "d");
	let b = fs.create(dir, FileType::RegularFile, "b");

	let mut data = [0u8; BSIZE];
	data[0] = 1;
	fs.write(a, 0, &data);
	fs.write(b, 0, &data);
	fs.write(b, 1, &data);

	fs.unlink(dir, "b");
	fs.unlink(ROOT, "a");

	assert_bitmap_matches_references(&fs.into_image());
}

/// Regression test: `create` must not leak a data block when it needs a
/// new parent directory block but the inode table is already exhausted.
/// Filling a directory's first block exactly (62 files plus "." and
/// "..") consumes every inode (`NINODES` = 64: root, the directory
/// itself, and 62 children); the next `create` in that directory then
/// needs both a new parent block and a free inode, and must fail before
/// allocating anything.
#[test]
fn create_failing_on_exhausted_inodes_leaks_no_block() {
	let (_dir, mut fs) = new_engine();

	let dir = fs.create(ROOT, FileType::Directory, "full");
	assert!(dir > 0);

	let entries_per_block = image::DIRENTS_PER_BLOCK;
	let children_to_fill_one_block = entries_per_block - 2; // "." and ".."
	assert_eq!(children_to_fill_one_block + 2 /* root, dir */, NINODES);

	for i in 0..children_to_fill_one_block {
		let inum = fs.create(dir, FileType::RegularFile, &format!("f{i}"));
		assert!(inum > 0, "ran out of inodes before expected");
	}

	// Every inode is now in use; this call needs a second directory
	// block for `dir` as well as a free inode, and has neither.
	assert_eq!(fs.create(dir, FileType::RegularFile, "overflow"), -1);

	let image = fs.into_image();
	let dir_inode = *image.inode(dir as usize);
	assert_eq!(
		dir_inode.addrs[1],
		image::layout::ALL_ONES,
		"a second directory block must not have been allocated"
	);
	assert_bitmap_matches_references(&image);
}
