//! The `mfs-server` binary: a single-threaded receive/dispatch/reply loop
//! over one datagram endpoint, backed by a single on-disk image.
//!
//! Grounded on the teacher's small single-purpose binaries (`mkfs`,
//! `mount`): manual positional-argument parsing, `eprintln!` plus
//! `exit(1)` on a bad invocation, and the actual work delegated to a
//! library crate (`mfs-image` here, `utils`/`ext2` there).

use std::env;
use std::path::PathBuf;
use std::process::exit;

use image::{FsEngine, Image};
use log::info;
use proto::Transport;
use server::dispatch;

struct Args {
	prog: String,
	port: u16,
	image_path: PathBuf,
}

fn parse_args() -> Args {
	let mut argv = env::args();
	let prog = argv.next().unwrap_or_else(|| "mfs-server".to_owned());

	let args: Vec<String> = argv.collect();
	let [port, image_path] = args.as_slice() else {
		eprintln!("Usage: {prog} <port> <image-path>");
		exit(1);
	};

	let port: u16 = port.parse().unwrap_or_else(|_| {
		eprintln!("{prog}: invalid port {port:?}");
		exit(1);
	});

	Args {
		prog,
		port,
		image_path: PathBuf::from(image_path),
	}
}

fn main() {
	env_logger::init();
	let args = parse_args();

	let image = Image::open_or_create(&args.image_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, args.image_path.display(), e);
		exit(1);
	});
	let engine = FsEngine::new(image);

	let transport = Transport::bind(("0.0.0.0", args.port)).unwrap_or_else(|e| {
		eprintln!("{}: failed to bind port {}: {}", args.prog, args.port, e);
		exit(1);
	});

	info!(
		"mfs-server listening on port {}, image {}",
		args.port,
		args.image_path.display()
	);

	dispatch::serve(engine, transport);
}
