//! Integration test entry point for rdb-harness.
//!
//! Run with: cargo test -p rdb-harness --test integration
//! The live cluster test additionally needs RDB_SERVER_BINARY (and ruby).

mod harness;
mod live;
mod process;
