//! Typed errors for the metadata engine and the server.
//!
//! These never cross the wire directly: every reply still collapses to the
//! single `rc = -1` the protocol specifies. The typed error exists so the
//! server can log *why* an operation failed.

use thiserror::Error;

/// An error produced by a metadata-engine operation.
#[derive(Debug, Error)]
pub enum MfsError {
	/// An inode index fell outside `[0, NINODES)`.
	#[error("invalid inode number {0}")]
	InvalidInode(i32),
	/// A block index fell outside the valid range for the operation.
	#[error("invalid block number {0}")]
	InvalidBlock(i32),
	/// A name exceeded `NAME_MAX` bytes.
	#[error("name too long ({0} bytes)")]
	NameTooLong(usize),
	/// The operation required a different inode type than the one found.
	#[error("wrong inode type")]
	WrongType,
	/// The inode table has no `UNUSED` slot left.
	#[error("no free inode")]
	NoFreeInode,
	/// The data bitmap has no free bit left.
	#[error("no free data block")]
	NoFreeBlock,
	/// A directory has no free entry slot and no spare `addrs[]` slot.
	#[error("directory full")]
	DirectoryFull,
	/// `unlink` was called on a directory containing entries other than
	/// "." and "..".
	#[error("directory not empty")]
	DirectoryNotEmpty,
	/// A positioned read or write on the image failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	/// A lookup found no entry with the given name. Not a wire-level
	/// distinct failure mode, just a clearer log message than reusing
	/// one of the validation variants above.
	#[error("not found")]
	NotFound,
}

/// Convenience alias used throughout the metadata engine.
pub type Result<T> = std::result::Result<T, MfsError>;

impl MfsError {
	/// Collapses any error into the wire-level `rc = -1` convention.
	pub fn rc(&self) -> i32 {
		-1
	}
}
