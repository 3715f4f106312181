//! Library half of `mfs-server`: the dispatch loop, kept in a library
//! target (mirroring `mfs-image`/`mfs-proto`'s own `src/lib.rs` + `src/
//! main.rs` split) so integration tests can drive it over a real
//! loopback socket instead of only unit-testing `dispatch::handle`
//! directly.

pub mod dispatch;
