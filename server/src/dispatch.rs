//! Maps wire requests onto [`FsEngine`] calls and replies.

use image::{BSIZE, FileType as DiskFileType, FsEngine};
use log::{debug, warn};
use proto::{Cmd, FileType as WireFileType, Request, Response, Stat as WireStat, Transport};

fn wire_to_disk_type(t: i32) -> DiskFileType {
	match WireFileType::from_i32(t) {
		Some(WireFileType::Directory) => DiskFileType::Directory,
		_ => DiskFileType::RegularFile,
	}
}

fn disk_to_wire_type(t: DiskFileType) -> i32 {
	match t {
		DiskFileType::Unused => 0,
		DiskFileType::RegularFile => 1,
		DiskFileType::Directory => 2,
	}
}

/// Runs the receive/dispatch/reply loop until a `shutdown` request is
/// handled.
pub fn serve(mut engine: FsEngine, transport: Transport) {
	let mut buf = [0u8; proto::REQUEST_SIZE];

	loop {
		let (n, from) = match transport.recv_from(&mut buf) {
			Ok(v) => v,
			Err(e) => {
				warn!("recv_from failed: {e}");
				continue;
			}
		};

		let req = match Request::from_bytes(&buf[..n]) {
			Ok(r) => r,
			Err(e) => {
				warn!("malformed request from {from}: {e}");
				continue;
			}
		};

		debug!(
			"{:?} inum={} blocknum={} name={:?} from {}",
			req.cmd, req.inum, req.blocknum, req.name, from
		);

		if req.cmd == Cmd::Shutdown {
			let resp = Response {
				rc: 0,
				..Default::default()
			};
			let _ = transport.send_to(&resp.to_bytes(), from);

			if let Err(e) = engine.flush() {
				warn!("flush on shutdown failed: {e}");
			}
			log::info!("shutting down");
			return;
		}

		let resp = handle(&mut engine, &req);
		if let Err(e) = transport.send_to(&resp.to_bytes(), from) {
			warn!("send_to {from} failed: {e}");
		}
	}
}

fn handle(engine: &mut FsEngine, req: &Request) -> Response {
	match req.cmd {
		Cmd::Init => Response {
			rc: 0,
			..Default::default()
		},

		Cmd::Lookup => Response {
			rc: engine.lookup(req.inum, &req.name),
			..Default::default()
		},

		Cmd::Stat => match engine.stat(req.inum) {
			Some(stat) => Response {
				rc: 0,
				stat: WireStat {
					r#type: disk_to_wire_type(stat.ftype),
					size: stat.size as i32,
				},
				..Default::default()
			},
			None => Response {
				rc: -1,
				..Default::default()
			},
		},

		Cmd::Read => {
			let mut out = [0u8; BSIZE];
			let rc = engine.read(req.inum, req.blocknum, &mut out);
			Response {
				rc,
				block: out.to_vec(),
				..Default::default()
			}
		}

		Cmd::Write => {
			let mut data = [0u8; BSIZE];
			let n = req.block.len().min(BSIZE);
			data[..n].copy_from_slice(&req.block[..n]);
			Response {
				rc: engine.write(req.inum, req.blocknum, &data),
				..Default::default()
			}
		}

		Cmd::Create => Response {
			rc: engine.create(req.inum, wire_to_disk_type(req.r#type), &req.name),
			..Default::default()
		},

		Cmd::Unlink => Response {
			rc: engine.unlink(req.inum, &req.name),
			..Default::default()
		},

		Cmd::Shutdown => unreachable!("handled in serve()"),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use image::Image;
	use proto::FileType as WireFileType;

	fn new_engine() -> (tempfile::TempDir, FsEngine) {
		let dir = tempfile::tempdir().unwrap();
		let img = Image::open_or_create(&dir.path().join("mfs.img")).unwrap();
		(dir, FsEngine::new(img))
	}

	#[test]
	fn init_always_succeeds() {
		let (_dir, mut engine) = new_engine();
		let resp = handle(
			&mut engine,
			&Request {
				cmd: Cmd::Init,
				..Default::default()
			},
		);
		assert_eq!(resp.rc, 0);
	}

	#[test]
	fn create_then_lookup_then_stat_through_dispatch() {
		let (_dir, mut engine) = new_engine();

		let create = handle(
			&mut engine,
			&Request {
				cmd: Cmd::Create,
				inum: 0,
				r#type: WireFileType::RegularFile as i32,
				name: "greeting".to_owned(),
				..Default::default()
			},
		);
		assert!(create.rc > 0);
		let inum = create.rc;

		let lookup = handle(
			&mut engine,
			&Request {
				cmd: Cmd::Lookup,
				inum: 0,
				name: "greeting".to_owned(),
				..Default::default()
			},
		);
		assert_eq!(lookup.rc, inum);

		let stat = handle(
			&mut engine,
			&Request {
				cmd: Cmd::Stat,
				inum,
				..Default::default()
			},
		);
		assert_eq!(stat.rc, 0);
		assert_eq!(stat.stat.r#type, WireFileType::RegularFile as i32);
		assert_eq!(stat.stat.size, 0);
	}

	#[test]
	fn wire_to_disk_type_defaults_unknown_to_regular_file() {
		assert_eq!(wire_to_disk_type(99), DiskFileType::RegularFile);
		assert_eq!(wire_to_disk_type(WireFileType::Directory as i32), DiskFileType::Directory);
	}
}
