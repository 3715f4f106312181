//! The `mfs-client` command issues one MFS operation against a running
//! server and prints the result, for manual/interactive use.
//!
//! Grounded on the teacher's `mutils` dispatch idiom (`mutils/src/main.rs`):
//! a single `match` on the requested operation name, a `print_usage`
//! helper, and `eprintln!` plus `exit(1)` on a bad invocation, rather than
//! an argument-parsing crate.

use std::env;
use std::process::exit;

use mfs_client::MfsClient;
use proto::{FileType, BLOCK_LEN};

fn print_usage(bin: &str) {
	println!("Usage:");
	println!(" {bin} <host:port> init");
	println!(" {bin} <host:port> lookup <pinum> <name>");
	println!(" {bin} <host:port> stat <inum>");
	println!(" {bin} <host:port> read <inum> <block>");
	println!(" {bin} <host:port> write <inum> <block> <text>");
	println!(" {bin} <host:port> create <pinum> <file|dir> <name>");
	println!(" {bin} <host:port> unlink <pinum> <name>");
	println!(" {bin} <host:port> shutdown");
}

fn parse_i32(bin: &str, what: &str, s: &str) -> i32 {
	s.parse().unwrap_or_else(|_| {
		eprintln!("{bin}: invalid {what} {s:?}");
		exit(1);
	})
}

fn main() {
	env_logger::init();

	let args: Vec<String> = env::args().collect();
	let bin = args.first().cloned().unwrap_or_else(|| "mfs-client".to_owned());

	if args.len() < 3 {
		print_usage(&bin);
		exit(1);
	}

	let server = &args[1];
	let op = args[2].as_str();
	let rest = &args[3..];

	let client = MfsClient::connect(server).unwrap_or_else(|e| {
		eprintln!("{bin}: cannot connect to {server}: {e}");
		exit(1);
	});

	let result = match op {
		"init" => client.init().map(|rc| println!("rc={rc}")),

		"lookup" => {
			let [pinum, name] = rest else {
				print_usage(&bin);
				exit(1);
			};
			let pinum = parse_i32(&bin, "pinum", pinum);
			client.lookup(pinum, name).map(|rc| println!("inum={rc}"))
		}

		"stat" => {
			let [inum] = rest else {
				print_usage(&bin);
				exit(1);
			};
			let inum = parse_i32(&bin, "inum", inum);
			client.stat(inum).map(|stat| match stat {
				Some(s) => println!("type={} size={}", s.r#type, s.size),
				None => println!("rc=-1"),
			})
		}

		"read" => {
			let [inum, block] = rest else {
				print_usage(&bin);
				exit(1);
			};
			let inum = parse_i32(&bin, "inum", inum);
			let block = parse_i32(&bin, "block", block);
			let mut out = [0u8; BLOCK_LEN];
			client.read(inum, block, &mut out).map(|rc| {
				if rc == 0 {
					let end = out.iter().position(|&b| b == 0).unwrap_or(out.len());
					println!("{}", String::from_utf8_lossy(&out[..end]));
				} else {
					println!("rc={rc}");
				}
			})
		}

		"write" => {
			let [inum, block, text] = rest else {
				print_usage(&bin);
				exit(1);
			};
			let inum = parse_i32(&bin, "inum", inum);
			let block = parse_i32(&bin, "block", block);
			let mut data = [0u8; BLOCK_LEN];
			let bytes = text.as_bytes();
			let n = bytes.len().min(BLOCK_LEN);
			data[..n].copy_from_slice(&bytes[..n]);
			client.write(inum, block, &data).map(|rc| println!("rc={rc}"))
		}

		"create" => {
			let [pinum, kind, name] = rest else {
				print_usage(&bin);
				exit(1);
			};
			let pinum = parse_i32(&bin, "pinum", pinum);
			let ftype = match kind.as_str() {
				"file" => FileType::RegularFile,
				"dir" => FileType::Directory,
				_ => {
					eprintln!("{bin}: invalid type {kind:?}, expected `file` or `dir`");
					exit(1);
				}
			};
			client.create(pinum, ftype, name).map(|rc| println!("inum={rc}"))
		}

		"unlink" => {
			let [pinum, name] = rest else {
				print_usage(&bin);
				exit(1);
			};
			let pinum = parse_i32(&bin, "pinum", pinum);
			client.unlink(pinum, name).map(|rc| println!("rc={rc}"))
		}

		"shutdown" => client.shutdown().map(|()| println!("rc=0")),

		_ => {
			print_usage(&bin);
			exit(1);
		}
	};

	if let Err(e) = result {
		eprintln!("{bin}: {op} failed: {e}");
		exit(1);
	}
}
