//! Thin wrapper over an unordered, best-effort datagram channel.
//!
//! This is the one piece of the system explicitly treated as an external
//! collaborator: it exposes bind/send/receive/close and nothing else. It
//! does not retry, order, or deduplicate anything; that is the client
//! stub's job.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// A bound datagram endpoint.
pub struct Transport {
	socket: UdpSocket,
}

impl Transport {
	/// Binds to the given local address (`0.0.0.0:port` for a server,
	/// `0.0.0.0:0` for an ephemeral client port).
	pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
		let socket = UdpSocket::bind(addr)?;
		Ok(Self {
			socket,
		})
	}

	/// Sends a buffer to `addr`. The whole buffer is transmitted as one
	/// datagram.
	pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<()> {
		self.socket.send_to(buf, addr)?;
		Ok(())
	}

	/// Receives a datagram into `buf`, returning the number of bytes read
	/// and the sender's address.
	pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
		self.socket.recv_from(buf)
	}

	/// Sets the read timeout used by [`Transport::recv_from`]. Passing
	/// `None` blocks indefinitely.
	pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
		self.socket.set_read_timeout(timeout)
	}

	/// Returns the local address this endpoint is bound to.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.socket.local_addr()
	}
}

// `Transport` closes its socket on drop, matching `UDP_Close`'s role in the
// source protocol; there is no explicit `close` method because `UdpSocket`
// already closes the descriptor when dropped.
