//! Wire protocol, transport adapter, and shared error type for MFS.
//!
//! This crate is the thin common layer shared by the `mfs-server` and
//! `mfs-client` binaries, in the same role the teacher's `utils` crate
//! plays for its own family of small command-line tools.

pub mod error;
pub mod transport;
pub mod wire;

pub use error::{MfsError, Result};
pub use transport::Transport;
pub use wire::{Cmd, FileType, Request, Response, Stat, BLOCK_LEN, NAME_LEN, REQUEST_SIZE, RESPONSE_SIZE};

/// The client's retransmission timeout, per spec: 5 seconds.
pub const RETRY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
