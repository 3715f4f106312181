//! Fixed-size wire messages exchanged between client and server.
//!
//! Every field occupies the same byte range on every message regardless of
//! the operation, matching the fixed-record-size simplification the
//! protocol calls for. Encoding is defined explicitly field by field
//! instead of transmuting a `#[repr(C)]` struct, so the layout does not
//! depend on the compiler or the host's endianness.

use std::io;

/// Maximum length of the `cmd` field, including the NUL terminator.
pub const CMD_LEN: usize = 24;
/// Maximum length of the `name` field, including the NUL terminator.
pub const NAME_LEN: usize = 64;
/// Size in bytes of a data block carried on the wire.
pub const BLOCK_LEN: usize = 4096;

/// Size in bytes of an encoded [`Request`].
pub const REQUEST_SIZE: usize = CMD_LEN + 4 + 4 + 4 + NAME_LEN + BLOCK_LEN;
/// Size in bytes of an encoded [`Response`].
pub const RESPONSE_SIZE: usize = 4 + 8 + BLOCK_LEN;

/// The operation a request asks the server to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
	Init,
	Lookup,
	Stat,
	Write,
	Read,
	Create,
	Unlink,
	Shutdown,
}

impl Cmd {
	fn as_str(self) -> &'static str {
		match self {
			Cmd::Init => "init",
			Cmd::Lookup => "lookup",
			Cmd::Stat => "stat",
			Cmd::Write => "write",
			Cmd::Read => "read",
			Cmd::Create => "create",
			Cmd::Unlink => "unlink",
			Cmd::Shutdown => "shutdown",
		}
	}

	fn from_str(s: &str) -> Option<Self> {
		Some(match s {
			"init" => Cmd::Init,
			"lookup" => Cmd::Lookup,
			"stat" => Cmd::Stat,
			"write" => Cmd::Write,
			"read" => Cmd::Read,
			"create" => Cmd::Create,
			"unlink" => Cmd::Unlink,
			"shutdown" => Cmd::Shutdown,
			_ => return None,
		})
	}
}

/// An inode's type, as carried in `create`'s `type` field and `stat`'s
/// response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
	Unused = 0,
	RegularFile = 1,
	Directory = 2,
}

impl FileType {
	pub fn from_i32(v: i32) -> Option<Self> {
		Some(match v {
			0 => FileType::Unused,
			1 => FileType::RegularFile,
			2 => FileType::Directory,
			_ => return None,
		})
	}
}

fn put_cstr(buf: &mut [u8], s: &str) {
	let bytes = s.as_bytes();
	let n = bytes.len().min(buf.len() - 1);
	buf[..n].copy_from_slice(&bytes[..n]);
	buf[n] = 0;
	for b in &mut buf[n + 1..] {
		*b = 0;
	}
}

fn get_cstr(buf: &[u8]) -> String {
	let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
	String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// A request message, fixed-size on the wire.
#[derive(Debug, Clone)]
pub struct Request {
	pub cmd: Cmd,
	pub inum: i32,
	pub r#type: i32,
	pub blocknum: i32,
	pub name: String,
	pub block: Vec<u8>,
}

impl Default for Request {
	fn default() -> Self {
		Self {
			cmd: Cmd::Init,
			inum: -1,
			r#type: -1,
			blocknum: -1,
			name: String::new(),
			block: vec![0u8; BLOCK_LEN],
		}
	}
}

impl Request {
	/// Encodes this request into its fixed-size wire representation.
	pub fn to_bytes(&self) -> [u8; REQUEST_SIZE] {
		let mut buf = [0u8; REQUEST_SIZE];
		let mut off = 0;

		put_cstr(&mut buf[off..off + CMD_LEN], self.cmd.as_str());
		off += CMD_LEN;

		buf[off..off + 4].copy_from_slice(&self.inum.to_le_bytes());
		off += 4;
		buf[off..off + 4].copy_from_slice(&self.r#type.to_le_bytes());
		off += 4;
		buf[off..off + 4].copy_from_slice(&self.blocknum.to_le_bytes());
		off += 4;

		put_cstr(&mut buf[off..off + NAME_LEN], &self.name);
		off += NAME_LEN;

		let n = self.block.len().min(BLOCK_LEN);
		buf[off..off + n].copy_from_slice(&self.block[..n]);

		buf
	}

	/// Decodes a request from its fixed-size wire representation.
	pub fn from_bytes(buf: &[u8]) -> io::Result<Self> {
		if buf.len() < REQUEST_SIZE {
			return Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				"short request datagram",
			));
		}

		let mut off = 0;
		let cmd_str = get_cstr(&buf[off..off + CMD_LEN]);
		let cmd = Cmd::from_str(&cmd_str)
			.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown command"))?;
		off += CMD_LEN;

		let inum = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;
		let r#type = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;
		let blocknum = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;

		let name = get_cstr(&buf[off..off + NAME_LEN]);
		off += NAME_LEN;

		let block = buf[off..off + BLOCK_LEN].to_vec();

		Ok(Self {
			cmd,
			inum,
			r#type,
			blocknum,
			name,
			block,
		})
	}
}

/// The `type`/`size` payload filled in by `stat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stat {
	pub r#type: i32,
	pub size: i32,
}

/// A response message, fixed-size on the wire.
#[derive(Debug, Clone)]
pub struct Response {
	pub rc: i32,
	pub stat: Stat,
	pub block: Vec<u8>,
}

impl Default for Response {
	fn default() -> Self {
		Self {
			rc: -1,
			stat: Stat::default(),
			block: vec![0u8; BLOCK_LEN],
		}
	}
}

impl Response {
	/// Encodes this response into its fixed-size wire representation.
	pub fn to_bytes(&self) -> [u8; RESPONSE_SIZE] {
		let mut buf = [0u8; RESPONSE_SIZE];
		let mut off = 0;

		buf[off..off + 4].copy_from_slice(&self.rc.to_le_bytes());
		off += 4;

		buf[off..off + 4].copy_from_slice(&self.stat.r#type.to_le_bytes());
		off += 4;
		buf[off..off + 4].copy_from_slice(&self.stat.size.to_le_bytes());
		off += 4;

		let n = self.block.len().min(BLOCK_LEN);
		buf[off..off + n].copy_from_slice(&self.block[..n]);

		buf
	}

	/// Decodes a response from its fixed-size wire representation.
	pub fn from_bytes(buf: &[u8]) -> io::Result<Self> {
		if buf.len() < RESPONSE_SIZE {
			return Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				"short response datagram",
			));
		}

		let mut off = 0;
		let rc = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;

		let r#type = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;
		let size = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;

		let block = buf[off..off + BLOCK_LEN].to_vec();

		Ok(Self {
			rc,
			stat: Stat { r#type, size },
			block,
		})
	}
}
